use thiserror::Error;

/// Errors surfaced by the pipeline registry (C6) and the module/hook
/// subsystems built on top of it.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("pipeline '{name}' already exists at {path} (pass overwrite=true to replace it)")]
    AlreadyExists { name: String, path: String },

    #[error("pipeline '{name}' not found under {dir}")]
    NotFound { name: String, dir: String },

    #[error("'{name}' is not a valid pipeline identifier")]
    InvalidIdentifier { name: String },

    #[error(
        "no module builder registered for pipeline '{name}'; register one with \
         `PipelineModuleRegistry::register` before calling `get_pipeline`"
    )]
    ModuleNotRegistered { name: String },

    #[error(transparent)]
    Config(#[from] flowerpower_config::ConfigValidationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub fn kind(&self) -> flowerpower_core::ErrorKind {
        match self {
            RegistryError::Config(_) => flowerpower_core::ErrorKind::Validation,
            RegistryError::Io(_) => flowerpower_core::ErrorKind::Io,
            _ => flowerpower_core::ErrorKind::Other("registry".to_string()),
        }
    }
}

impl flowerpower_core::Classify for RegistryError {
    fn kind(&self) -> flowerpower_core::ErrorKind {
        RegistryError::kind(self)
    }
}
