use crate::error::ConfigValidationError;
use flowerpower_core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bounded exponential backoff parameters consumed by `flowerpower-retry`.
///
/// `retry_exceptions` names error kinds rather than language-native
/// exception types, so a policy loaded from YAML is lossless and portable.
/// An empty set (the default) matches any error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    #[serde(default)]
    pub jitter_factor: f64,
    #[serde(default = "default_retry_exceptions")]
    pub retry_exceptions: HashSet<ErrorKind>,
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_retry_exceptions() -> HashSet<ErrorKind> {
    let mut set = HashSet::new();
    set.insert(ErrorKind::Any);
    set
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: default_retry_delay(),
            jitter_factor: 0.0,
            retry_exceptions: default_retry_exceptions(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: f64, jitter_factor: f64) -> Self {
        Self {
            max_retries,
            retry_delay,
            jitter_factor,
            retry_exceptions: default_retry_exceptions(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.retry_delay.is_finite() || self.retry_delay < 0.0 {
            return Err(ConfigValidationError::NotNonNegativeFinite {
                field: "retry.retry_delay",
                value: self.retry_delay,
            });
        }
        if !self.jitter_factor.is_finite() || self.jitter_factor < 0.0 {
            return Err(ConfigValidationError::NotNonNegativeFinite {
                field: "retry.jitter_factor",
                value: self.jitter_factor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_any_error_kind() {
        let policy = RetryPolicy::default();
        assert!(policy.retry_exceptions.contains(&ErrorKind::Any));
        assert_eq!(policy.max_retries, 0);
    }

    #[test]
    fn validate_rejects_negative_delay() {
        let policy = RetryPolicy {
            retry_delay: -1.0,
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_jitter() {
        let policy = RetryPolicy {
            jitter_factor: f64::NAN,
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn validate_accepts_zero_values() {
        let policy = RetryPolicy::new(0, 0.0, 0.0);
        assert!(policy.validate().is_ok());
    }
}
