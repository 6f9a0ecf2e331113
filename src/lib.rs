//! FlowerPower: pipeline orchestration and job-queue subsystem.
//!
//! A `FlowerPowerProject` loads or creates a project directory, resolves
//! named pipelines into DAGs (`flowerpower_pipeline`), and runs them
//! directly, via a `PipelineManager`, or through a job queue and scheduler
//! (`flowerpower_queue`) backed by an in-memory or Redis store.
//!
//! ```rust,no_run
//! use flowerpower::FlowerPowerProject;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let project = FlowerPowerProject::new(Some("demo"), "./demo", false).await?;
//! let outputs = project.run("my_pipeline", None).await?;
//! # let _ = outputs;
//! # Ok(())
//! # }
//! ```
//!
//! # Key modules
//!
//! - [`flowerpower_project`] - `FlowerPowerProject` and `PipelineManager`, the
//!   entry points most callers use.
//! - [`flowerpower_pipeline`] - DAG construction and the `PipelineRunner`.
//! - [`flowerpower_queue`] - `JobQueueManager`, workers, and schedules.
//! - [`flowerpower_registry`] - on-disk pipeline discovery and module loading.
//! - [`flowerpower_config`] - `RunConfig`, `ProjectConfig`, `JobQueueConfig`.
//! - [`flowerpower_retry`] - the retry/backoff policy shared by runner and queue.
//! - [`flowerpower_core`] - ids, timestamps, the callback registry, error kinds.

pub use flowerpower_config::{
    AdapterSettings, ConfigValidationError, ExecutorConfig, ExecutorType, JobQueueConfig,
    PipelineConfig, ProjectConfig, RetryPolicy, RunConfig,
};
pub use flowerpower_core::{Classify, ErrorKind, JobId};
pub use flowerpower_pipeline::{
    AdapterManager, DistributedDispatcher, ExecutorFactory, NodeFn, NodeSpec, PipelineError,
    PipelineGraphSpec, PipelineModule, PipelineRunner,
};
pub use flowerpower_queue::{
    AddJobParams, AddScheduleParams, BackendRegistry, Job, JobFn, JobFunctionRegistry,
    JobQueueManager, JobStatus, QueueError, RetrySpec, Schedule, ScheduleTrigger,
};
pub use flowerpower_registry::{
    Pipeline, PipelineModuleRegistry, PipelineRegistry, PipelineRegistrySummary, PipelineSummary,
    RegistryError,
};
pub use flowerpower_retry::RetryManager;

pub use flowerpower_project::{FlowerPowerProject, PipelineManager, ProjectError, QueueDispatcher, Runtime};
