use thiserror::Error;

/// Errors surfaced by `FlowerPowerProject` and `PipelineManager` (C7/C10).
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("project directory {path} already has a project; pass overwrite=true to replace it")]
    AlreadyExists { path: String },

    #[error("no project found at {path} (missing conf/project.yml)")]
    NotFound { path: String },

    #[error(transparent)]
    Registry(#[from] flowerpower_registry::RegistryError),

    #[error(transparent)]
    Pipeline(#[from] flowerpower_pipeline::PipelineError),

    #[error(transparent)]
    Queue(#[from] flowerpower_queue::QueueError),

    #[error(transparent)]
    Config(#[from] flowerpower_config::ConfigValidationError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProjectError {
    pub fn kind(&self) -> flowerpower_core::ErrorKind {
        match self {
            ProjectError::Registry(e) => e.kind(),
            ProjectError::Pipeline(e) => e.kind(),
            ProjectError::Queue(e) => e.kind(),
            ProjectError::Config(_) => flowerpower_core::ErrorKind::Validation,
            ProjectError::Serialization(_) => flowerpower_core::ErrorKind::Validation,
            ProjectError::Io(_) => flowerpower_core::ErrorKind::Io,
            _ => flowerpower_core::ErrorKind::Other("project".to_string()),
        }
    }
}

impl flowerpower_core::Classify for ProjectError {
    fn kind(&self) -> flowerpower_core::ErrorKind {
        ProjectError::kind(self)
    }
}
