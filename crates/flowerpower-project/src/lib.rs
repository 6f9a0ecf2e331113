//! The project root object and its run/enqueue/schedule façade, plus the
//! job-queue-backed `DistributedDispatcher` that lets a DAG hand a node off
//! to the queue without `flowerpower-pipeline` knowing the queue exists.

mod dispatcher;
mod error;
mod manager;
mod project;
mod runtime;

pub use dispatcher::QueueDispatcher;
pub use error::ProjectError;
pub use manager::PipelineManager;
pub use project::FlowerPowerProject;
pub use runtime::Runtime;
