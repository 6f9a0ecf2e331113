use crate::adapter::WithAdapterConfig;
use crate::callback_spec::CallbackSpec;
use crate::error::ConfigValidationError;
use crate::executor::{ExecutorConfig, ExecutorType};
use crate::log_level::LogLevel;
use crate::run_config::RunConfig;
use serde_json::Value;
use std::collections::HashMap;

/// Mutable accumulator for building an immutable `RunConfig`.
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    draft: RunConfig,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self {
            draft: RunConfig::default(),
        }
    }

    pub fn from_config(existing: &RunConfig) -> Self {
        Self {
            draft: existing.clone(),
        }
    }

    pub fn with_inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.draft.inputs = inputs;
        self
    }

    pub fn with_final_vars(mut self, final_vars: Vec<String>) -> Self {
        self.draft.final_vars = final_vars;
        self
    }

    pub fn with_executor(mut self, executor_type: ExecutorType) -> Self {
        self.draft.executor = ExecutorConfig {
            executor_type,
            ..self.draft.executor
        };
        self
    }

    pub fn with_executor_config(mut self, executor: ExecutorConfig) -> Self {
        self.draft.executor = executor;
        self
    }

    pub fn with_retries(mut self, max: u32, delay: f64, jitter: f64) -> Self {
        self.draft.retry.max_retries = max;
        self.draft.retry.retry_delay = delay;
        self.draft.retry.jitter_factor = jitter;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.draft.log_level = log_level;
        self
    }

    pub fn with_on_success(mut self, callback: CallbackSpec) -> Self {
        self.draft.on_success = Some(callback);
        self
    }

    pub fn with_on_failure(mut self, callback: CallbackSpec) -> Self {
        self.draft.on_failure = Some(callback);
        self
    }

    pub fn with_additional_modules(mut self, modules: Vec<String>) -> Self {
        self.draft.additional_modules = modules;
        self
    }

    pub fn with_adapter(mut self, with_adapter: WithAdapterConfig) -> Self {
        self.draft.with_adapter = with_adapter;
        self
    }

    pub fn with_async_driver(mut self, async_driver: bool) -> Self {
        self.draft.async_driver = async_driver;
        self
    }

    pub fn reset(mut self) -> Self {
        self.draft = RunConfig::default();
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigValidationError> {
        self.draft.validate()?;
        Ok(self.draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_produces_validated_run_config() {
        let rc = RunConfigBuilder::new()
            .with_final_vars(vec!["spend_mean".to_string()])
            .with_retries(3, 0.01, 0.0)
            .build()
            .unwrap();
        assert_eq!(rc.final_vars, vec!["spend_mean".to_string()]);
        assert_eq!(rc.retry.max_retries, 3);
    }

    #[test]
    fn build_rejects_invalid_retry_policy() {
        let result = RunConfigBuilder::new().with_retries(1, -5.0, 0.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn from_config_seeds_the_draft() {
        let base = RunConfig {
            reload: true,
            ..RunConfig::default()
        };
        let rc = RunConfigBuilder::from_config(&base).build().unwrap();
        assert!(rc.reload);
    }

    #[test]
    fn reset_discards_prior_state() {
        let rc = RunConfigBuilder::new()
            .with_final_vars(vec!["x".to_string()])
            .reset()
            .build()
            .unwrap();
        assert!(rc.final_vars.is_empty());
    }
}
