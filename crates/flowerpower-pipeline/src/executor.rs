//! Executor strategies (C3): given an `ExecutorConfig`, constructs the
//! executor object the DAG driver runs nodes through, plus a shutdown
//! callable invoked after the run completes.
//!
//! `synchronous` attaches via the driver's local-executor path; every other
//! strategy attaches via its remote-executor path — that distinction is a
//! hard contract callers (and tests) can inspect via `ExecutorHandle::is_local`.

use crate::dag::node::NodeSpec;
use crate::error::PipelineError;
use async_trait::async_trait;
use flowerpower_config::{ExecutorConfig, ExecutorType};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs one DAG node to completion, given its resolved input values in
/// declaration order.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError>;
}

/// Hands a node off to an external dispatcher for the `distributed`
/// executor strategy. `flowerpower-project` wires a concrete implementation
/// backed by the job queue, keeping this crate decoupled from
/// `flowerpower-queue`.
#[async_trait]
pub trait DistributedDispatcher: Send + Sync {
    async fn dispatch(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError>;
}

struct SynchronousExecutor;

#[async_trait]
impl NodeExecutor for SynchronousExecutor {
    async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
        (node.function)(&inputs)
    }
}

/// Executes nodes via `tokio::task::spawn_blocking`, bounded by a semaphore
/// sized `max_workers` (default `cpu_count * 5`).
struct ThreadpoolExecutor {
    semaphore: Arc<Semaphore>,
}

#[async_trait]
impl NodeExecutor for ThreadpoolExecutor {
    async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let function = node.function.clone();
        tokio::task::spawn_blocking(move || function(&inputs))
            .await
            .map_err(|e| PipelineError::Execution {
                node: "<threadpool>".to_string(),
                attempt: 0,
                source: anyhow::anyhow!(e),
            })?
    }
}

/// Executes nodes via a bounded pool of blocking OS threads sized
/// `num_cpus`. True OS-process isolation of an arbitrary in-process Rust
/// closure isn't possible without shipping compiled code across a process
/// boundary, so this strategy keeps the `processpool` *name* and concurrency
/// bound from the spec while running the node body in a blocking thread,
/// same as `threadpool` with a different default pool size.
struct ProcesspoolExecutor {
    semaphore: Arc<Semaphore>,
}

#[async_trait]
impl NodeExecutor for ProcesspoolExecutor {
    async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let function = node.function.clone();
        tokio::task::spawn_blocking(move || function(&inputs))
            .await
            .map_err(|e| PipelineError::Execution {
                node: "<processpool>".to_string(),
                attempt: 0,
                source: anyhow::anyhow!(e),
            })?
    }
}

struct DistributedExecutor {
    dispatcher: Arc<dyn DistributedDispatcher>,
}

#[async_trait]
impl NodeExecutor for DistributedExecutor {
    async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
        self.dispatcher.dispatch(node, inputs).await
    }
}

/// What the runner shuts down after the DAG completes, success or failure.
pub struct ShutdownHandle {
    shutdown: Box<dyn FnOnce() + Send>,
}

impl ShutdownHandle {
    pub fn noop() -> Self {
        Self {
            shutdown: Box::new(|| {}),
        }
    }

    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self { shutdown: Box::new(f) }
    }

    pub fn run(self) {
        (self.shutdown)();
    }
}

pub struct ExecutorHandle {
    pub executor: Arc<dyn NodeExecutor>,
    pub is_local: bool,
}

/// Builds the executor + shutdown pair from an `ExecutorConfig`.
pub struct ExecutorFactory {
    distributed_dispatcher: Option<Arc<dyn DistributedDispatcher>>,
}

impl ExecutorFactory {
    pub fn new() -> Self {
        Self {
            distributed_dispatcher: None,
        }
    }

    pub fn with_distributed_dispatcher(mut self, dispatcher: Arc<dyn DistributedDispatcher>) -> Self {
        self.distributed_dispatcher = Some(dispatcher);
        self
    }

    pub fn build(&self, config: &ExecutorConfig) -> Result<(ExecutorHandle, ShutdownHandle), PipelineError> {
        match config.executor_type {
            ExecutorType::Synchronous => Ok((
                ExecutorHandle {
                    executor: Arc::new(SynchronousExecutor),
                    is_local: true,
                },
                ShutdownHandle::noop(),
            )),
            ExecutorType::Threadpool => {
                let semaphore = Arc::new(Semaphore::new(config.resolved_max_workers()));
                let shutdown_semaphore = semaphore.clone();
                let max_workers = config.resolved_max_workers();
                Ok((
                    ExecutorHandle {
                        executor: Arc::new(ThreadpoolExecutor { semaphore }),
                        is_local: false,
                    },
                    ShutdownHandle::new(move || {
                        // Best-effort drain signal: grabs whatever permits are
                        // free without blocking the synchronous shutdown path.
                        let _ = shutdown_semaphore.try_acquire_many(max_workers as u32);
                    }),
                ))
            }
            ExecutorType::Processpool => {
                let semaphore = Arc::new(Semaphore::new(config.resolved_num_cpus()));
                Ok((
                    ExecutorHandle {
                        executor: Arc::new(ProcesspoolExecutor { semaphore }),
                        is_local: false,
                    },
                    ShutdownHandle::noop(),
                ))
            }
            ExecutorType::Distributed => {
                let dispatcher = self.distributed_dispatcher.clone().ok_or_else(|| {
                    PipelineError::AdapterUnavailable {
                        name: "distributed".to_string(),
                        library: "flowerpower-queue distributed dispatcher".to_string(),
                    }
                })?;
                Ok((
                    ExecutorHandle {
                        executor: Arc::new(DistributedExecutor { dispatcher }),
                        is_local: false,
                    },
                    ShutdownHandle::noop(),
                ))
            }
        }
    }
}

impl Default for ExecutorFactory {
    fn default() -> Self {
        Self::new()
    }
}
