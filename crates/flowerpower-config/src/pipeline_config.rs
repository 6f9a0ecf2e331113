use crate::error::ConfigValidationError;
use crate::run_config::RunConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Persisted per-pipeline defaults: one document per pipeline under
/// `conf/pipelines/<name>.yml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub params: HashMap<String, HashMap<String, Value>>,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            run: RunConfig::default(),
            params: HashMap::new(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigValidationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigValidationError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Identifier pattern enforced by `PipelineRegistry::new`: starts with a
    /// letter or underscore, followed by letters, digits, or underscores.
    pub fn is_valid_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !Self::is_valid_identifier(&self.name) {
            return Err(ConfigValidationError::InvalidIdentifier {
                name: self.name.clone(),
            });
        }
        self.run.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifiers_accepted() {
        assert!(PipelineConfig::is_valid_identifier("hello"));
        assert!(PipelineConfig::is_valid_identifier("_hello_2"));
    }

    #[test]
    fn invalid_identifiers_rejected() {
        assert!(!PipelineConfig::is_valid_identifier("2hello"));
        assert!(!PipelineConfig::is_valid_identifier("hello world"));
        assert!(!PipelineConfig::is_valid_identifier(""));
    }

    #[test]
    fn yaml_roundtrip_preserves_run_defaults() {
        let cfg = PipelineConfig::new("hello");
        let yaml = cfg.to_yaml_string().unwrap();
        let back = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg, back);
    }
}
