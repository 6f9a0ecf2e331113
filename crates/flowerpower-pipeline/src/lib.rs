//! The DAG execution engine: named-variable dependency graphs, executor
//! strategies, lifecycle adapters, and the pipeline runner that ties them
//! together.

mod adapter;
mod dag;
mod error;
mod executor;
mod runner;

pub use adapter::{Adapter, AdapterManager, CustomAdapter, ProgressAdapter, TracingAdapter};
pub use dag::{Dag, NodeFn, NodeSpec, PipelineGraphSpec, PipelineModule};
pub use error::PipelineError;
pub use executor::{
    DistributedDispatcher, ExecutorFactory, ExecutorHandle, NodeExecutor, ShutdownHandle,
};
pub use runner::{InMemoryModuleSource, ModuleSource, PipelineRunner};
