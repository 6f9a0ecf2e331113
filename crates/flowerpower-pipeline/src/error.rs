use flowerpower_config::ConfigValidationError;
use flowerpower_core::ErrorKind;
use thiserror::Error;

/// Errors surfaced by the DAG engine and pipeline runner.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline '{name}' not found (looked for {path})")]
    PipelineNotFound { name: String, path: String },

    #[error("could not import module(s) {tried:?} for additional module '{requested}'")]
    ModuleImport {
        requested: String,
        tried: Vec<String>,
    },

    #[error("adapter '{name}' was enabled but its backing library ({library}) is not available")]
    AdapterUnavailable { name: String, library: String },

    #[error("node '{node}' failed on attempt {attempt}: {source}")]
    Execution {
        node: String,
        attempt: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("graph is invalid: {0}")]
    InvalidGraph(String),

    #[error("unresolved input '{input}' required by node '{node}'")]
    UnresolvedInput { node: String, input: String },

    #[error(transparent)]
    Config(#[from] ConfigValidationError),
}

impl PipelineError {
    /// Classifies this error for retry-policy matching purposes. Only
    /// `Execution` errors are ever retryable; everything else is a
    /// configuration or structural defect that retrying cannot fix.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Execution { .. } => ErrorKind::Execution,
            PipelineError::Config(_) => ErrorKind::Validation,
            _ => ErrorKind::Other("pipeline".to_string()),
        }
    }
}

impl flowerpower_core::Classify for PipelineError {
    fn kind(&self) -> ErrorKind {
        PipelineError::kind(self)
    }
}
