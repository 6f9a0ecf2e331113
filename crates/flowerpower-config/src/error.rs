use thiserror::Error;

/// Raised by the config model and `RunConfigBuilder` when a field violates
/// its contract. User-correctable: the message always names the offending
/// field.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("field '{field}' must be non-negative and finite, got {value}")]
    NotNonNegativeFinite { field: &'static str, value: f64 },

    #[error("unknown field '{field}' in configuration (not in the documented deprecation list)")]
    UnknownField { field: String },

    #[error("unknown adapter '{name}' referenced in configuration")]
    UnknownAdapter { name: String },

    #[error("async_driver is false but run_async was called; set async_driver: true")]
    AsyncDriverDisabled,

    #[error("pipeline name '{name}' does not match the required identifier pattern")]
    InvalidIdentifier { name: String },

    #[error("exactly one of cron/interval/date must be set on a schedule, got {count}")]
    InvalidScheduleSpec { count: usize },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error loading configuration: {0}")]
    Io(#[from] std::io::Error),
}
