//! The validated, mergeable, YAML-serializable config model:
//! `RunConfig`, `PipelineConfig`, `ProjectConfig`, and their sub-structures.

mod adapter;
mod builder;
mod cache;
mod callback_spec;
mod error;
mod executor;
mod job_queue_config;
mod log_level;
mod pipeline_config;
mod project_config;
mod retry_policy;
mod run_config;

pub use adapter::{AdapterSettings, WithAdapterConfig};
pub use builder::RunConfigBuilder;
pub use cache::CacheConfig;
pub use callback_spec::CallbackSpec;
pub use error::ConfigValidationError;
pub use executor::{ExecutorConfig, ExecutorType};
pub use job_queue_config::JobQueueConfig;
pub use log_level::LogLevel;
pub use pipeline_config::PipelineConfig;
pub use project_config::ProjectConfig;
pub use retry_policy::RetryPolicy;
pub use run_config::RunConfig;
