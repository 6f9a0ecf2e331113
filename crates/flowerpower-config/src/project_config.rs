use crate::adapter::AdapterSettings;
use crate::error::ConfigValidationError;
use crate::job_queue_config::JobQueueConfig;
use serde::{Deserialize, Serialize};

/// Persisted project-level settings, stored at `conf/project.yml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub adapter: AdapterSettings,
    #[serde(default)]
    pub job_queue: JobQueueConfig,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: AdapterSettings::default(),
            job_queue: JobQueueConfig::default(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigValidationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigValidationError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Applies the `FP_*` environment overlay on top of the loaded file
    /// values. Env vars take highest precedence.
    pub fn apply_env_overlay(&mut self) -> Result<(), ConfigValidationError> {
        self.job_queue.apply_env_overlay()
    }
}
