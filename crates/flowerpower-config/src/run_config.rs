use crate::adapter::WithAdapterConfig;
use crate::cache::CacheConfig;
use crate::callback_spec::CallbackSpec;
use crate::error::ConfigValidationError;
use crate::executor::ExecutorConfig;
use crate::log_level::LogLevel;
use crate::retry_policy::RetryPolicy;
use flowerpower_core::ErrorKind;
use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The legacy top-level retry keys. If present at the top level of a run
/// section, they are migrated into `retry` on load and never re-emitted.
const LEGACY_RETRY_KEYS: [&str; 4] = ["max_retries", "retry_delay", "jitter_factor", "retry_exceptions"];

/// The immutable parameter bundle for a single pipeline execution.
///
/// `RunConfig` is never mutated in place; every transformation
/// (`merge`, `merge_dict`, the builder's `build`) produces a new instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub final_vars: Vec<String>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub with_adapter: WithAdapterConfig,
    #[serde(default)]
    pub pipeline_adapter_cfg: HashMap<String, Value>,
    #[serde(default)]
    pub project_adapter_cfg: HashMap<String, Value>,
    #[serde(default)]
    pub adapter: HashMap<String, Value>,
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<CallbackSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<CallbackSpec>,
    #[serde(default)]
    pub additional_modules: Vec<String>,
    #[serde(default)]
    pub async_driver: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inputs: HashMap::new(),
            final_vars: Vec::new(),
            config: HashMap::new(),
            cache: CacheConfig::default(),
            executor: ExecutorConfig::default(),
            with_adapter: WithAdapterConfig::default(),
            pipeline_adapter_cfg: HashMap::new(),
            project_adapter_cfg: HashMap::new(),
            adapter: HashMap::new(),
            reload: false,
            log_level: LogLevel::default(),
            retry: RetryPolicy::default(),
            on_success: None,
            on_failure: None,
            additional_modules: Vec::new(),
            async_driver: false,
        }
    }
}

/// Mirrors `RunConfig` field-for-field but captures everything not matched
/// by a named field, so legacy top-level retry keys (and genuinely unknown
/// keys) are visible before we decide what to do with them.
#[derive(Deserialize)]
struct RunConfigRaw {
    #[serde(default)]
    inputs: HashMap<String, Value>,
    #[serde(default)]
    final_vars: Vec<String>,
    #[serde(default)]
    config: HashMap<String, Value>,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    executor: ExecutorConfig,
    #[serde(default)]
    with_adapter: WithAdapterConfig,
    #[serde(default)]
    pipeline_adapter_cfg: HashMap<String, Value>,
    #[serde(default)]
    project_adapter_cfg: HashMap<String, Value>,
    #[serde(default)]
    adapter: HashMap<String, Value>,
    #[serde(default)]
    reload: bool,
    #[serde(default)]
    log_level: LogLevel,
    #[serde(default)]
    retry: RetryPolicy,
    #[serde(default)]
    on_success: Option<CallbackSpec>,
    #[serde(default)]
    on_failure: Option<CallbackSpec>,
    #[serde(default)]
    additional_modules: Vec<String>,
    #[serde(default)]
    async_driver: bool,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl<'de> Deserialize<'de> for RunConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = RunConfigRaw::deserialize(deserializer)?;
        let mut retry = raw.retry;

        for key in LEGACY_RETRY_KEYS {
            if let Some(value) = raw.extra.remove(key) {
                tracing::warn!(
                    field = key,
                    "deprecated top-level retry field found; migrating into `retry`"
                );
                match key {
                    "max_retries" => {
                        retry.max_retries =
                            serde_json::from_value(value).map_err(D::Error::custom)?;
                    }
                    "retry_delay" => {
                        retry.retry_delay =
                            serde_json::from_value(value).map_err(D::Error::custom)?;
                    }
                    "jitter_factor" => {
                        retry.jitter_factor =
                            serde_json::from_value(value).map_err(D::Error::custom)?;
                    }
                    "retry_exceptions" => {
                        let names: Vec<String> =
                            serde_json::from_value(value).map_err(D::Error::custom)?;
                        retry.retry_exceptions =
                            names.iter().map(|name| ErrorKind::parse(name)).collect();
                    }
                    _ => unreachable!(),
                }
            }
        }

        if let Some((field, _)) = raw.extra.into_iter().next() {
            return Err(D::Error::custom(format!(
                "unknown field `{field}` (not in the documented deprecation list)"
            )));
        }

        Ok(RunConfig {
            inputs: std::mem::take(&mut raw.inputs),
            final_vars: std::mem::take(&mut raw.final_vars),
            config: std::mem::take(&mut raw.config),
            cache: raw.cache,
            executor: raw.executor,
            with_adapter: raw.with_adapter,
            pipeline_adapter_cfg: std::mem::take(&mut raw.pipeline_adapter_cfg),
            project_adapter_cfg: std::mem::take(&mut raw.project_adapter_cfg),
            adapter: std::mem::take(&mut raw.adapter),
            reload: raw.reload,
            log_level: raw.log_level,
            retry,
            on_success: raw.on_success,
            on_failure: raw.on_failure,
            additional_modules: std::mem::take(&mut raw.additional_modules),
            async_driver: raw.async_driver,
        })
    }
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigValidationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigValidationError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_dict(map: HashMap<String, Value>) -> Result<Self, ConfigValidationError> {
        Ok(serde_json::from_value(Value::Object(map.into_iter().collect()))?)
    }

    pub fn to_dict(&self) -> Result<HashMap<String, Value>, ConfigValidationError> {
        let value = serde_json::to_value(self)?;
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => unreachable!("RunConfig always serializes to an object"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.retry.validate()?;
        for name in self.adapter.keys() {
            if name.trim().is_empty() {
                return Err(ConfigValidationError::UnknownAdapter { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Returns a new config where fields set in `other` override fields in
    /// `self`. Nested mappings (`inputs`, `config`, ...) replace wholesale;
    /// they are not deep-merged.
    pub fn merge(&self, other: &RunConfig) -> RunConfig {
        let default = RunConfig::default();
        RunConfig {
            inputs: if other.inputs != default.inputs {
                other.inputs.clone()
            } else {
                self.inputs.clone()
            },
            final_vars: if other.final_vars != default.final_vars {
                other.final_vars.clone()
            } else {
                self.final_vars.clone()
            },
            config: if other.config != default.config {
                other.config.clone()
            } else {
                self.config.clone()
            },
            cache: if other.cache != default.cache {
                other.cache.clone()
            } else {
                self.cache.clone()
            },
            executor: if other.executor != default.executor {
                other.executor
            } else {
                self.executor
            },
            with_adapter: if other.with_adapter != default.with_adapter {
                other.with_adapter
            } else {
                self.with_adapter
            },
            pipeline_adapter_cfg: if other.pipeline_adapter_cfg != default.pipeline_adapter_cfg {
                other.pipeline_adapter_cfg.clone()
            } else {
                self.pipeline_adapter_cfg.clone()
            },
            project_adapter_cfg: if other.project_adapter_cfg != default.project_adapter_cfg {
                other.project_adapter_cfg.clone()
            } else {
                self.project_adapter_cfg.clone()
            },
            adapter: if other.adapter != default.adapter {
                other.adapter.clone()
            } else {
                self.adapter.clone()
            },
            reload: if other.reload != default.reload {
                other.reload
            } else {
                self.reload
            },
            log_level: if other.log_level != default.log_level {
                other.log_level
            } else {
                self.log_level
            },
            retry: if other.retry != default.retry {
                other.retry.clone()
            } else {
                self.retry.clone()
            },
            on_success: other.on_success.clone().or_else(|| self.on_success.clone()),
            on_failure: other.on_failure.clone().or_else(|| self.on_failure.clone()),
            additional_modules: if other.additional_modules != default.additional_modules {
                other.additional_modules.clone()
            } else {
                self.additional_modules.clone()
            },
            async_driver: if other.async_driver != default.async_driver {
                other.async_driver
            } else {
                self.async_driver
            },
        }
    }

    /// Returns a new config with the dict's values applied, using the same
    /// override-if-set semantics as `merge`.
    pub fn merge_dict(&self, patch: HashMap<String, Value>) -> Result<RunConfig, ConfigValidationError> {
        let mut base = self.to_dict()?;
        for (key, value) in patch {
            base.insert(key, value);
        }
        RunConfig::from_dict(base)
    }
}
