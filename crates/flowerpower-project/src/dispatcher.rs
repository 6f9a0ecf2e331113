//! Backs the `distributed` executor strategy with the job queue: a DAG
//! node is registered as a one-shot job function, enqueued, and awaited.
//!
//! This is the seam `flowerpower-pipeline::executor::DistributedDispatcher`
//! defines precisely so that crate never has to depend on the queue. At
//! least one worker must already be running against the same
//! `JobQueueManager` for dispatched nodes to ever make progress.

use async_trait::async_trait;
use flowerpower_pipeline::{DistributedDispatcher, NodeSpec, PipelineError};
use flowerpower_queue::{AddJobParams, JobFunctionRegistry, JobQueueManager, JobStatus};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct QueueDispatcher {
    manager: Arc<dyn JobQueueManager>,
    functions: Arc<JobFunctionRegistry>,
    poll_interval: Duration,
}

impl QueueDispatcher {
    pub fn new(manager: Arc<dyn JobQueueManager>, functions: Arc<JobFunctionRegistry>) -> Self {
        Self {
            manager,
            functions,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn execution_error(node: &str, message: impl Into<String>) -> PipelineError {
        PipelineError::Execution {
            node: node.to_string(),
            attempt: 1,
            source: anyhow::anyhow!(message.into()),
        }
    }
}

#[async_trait]
impl DistributedDispatcher for QueueDispatcher {
    async fn dispatch(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
        let function_reference = format!("__dist::{}::{}", node.name, uuid::Uuid::new_v4());
        let node_function = node.function.clone();
        self.functions.register(
            function_reference.clone(),
            Arc::new(move |args, _kwargs| node_function(args).map_err(|e| anyhow::anyhow!(e.to_string()))),
        );

        let params = AddJobParams {
            args: inputs,
            ..AddJobParams::new(function_reference)
        };
        let job = self
            .manager
            .add_job(params)
            .await
            .map_err(|e| Self::execution_error(&node.name, e.to_string()))?;

        loop {
            let current = self
                .manager
                .get_job(&job.id)
                .await
                .map_err(|e| Self::execution_error(&node.name, e.to_string()))?
                .ok_or_else(|| Self::execution_error(&node.name, "dispatched job vanished from the queue"))?;

            match current.status {
                JobStatus::Succeeded => return Ok(current.result.unwrap_or(Value::Null)),
                JobStatus::Failed | JobStatus::Cancelled => {
                    return Err(Self::execution_error(
                        &node.name,
                        current.error.unwrap_or_else(|| format!("job ended as {:?}", current.status)),
                    ))
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}
