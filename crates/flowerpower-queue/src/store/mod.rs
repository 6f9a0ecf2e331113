//! The persistence seam the manager's scheduling/retry algorithms are
//! written against, so `MemoryStore` and `RedisStore` share one
//! implementation of `JobQueueManager` instead of duplicating it.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::QueueError;
use crate::types::{Job, Schedule, WorkerInfo};
use async_trait::async_trait;
use flowerpower_core::JobId;

#[async_trait]
pub trait Store: Send + Sync {
    async fn push_job(&self, job: Job) -> Result<(), QueueError>;
    async fn pop_job(&self, queue_name: &str) -> Result<Option<Job>, QueueError>;
    async fn put_job(&self, job: Job) -> Result<(), QueueError>;
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, QueueError>;
    async fn delete_job(&self, id: &JobId) -> Result<bool, QueueError>;
    async fn list_jobs(&self, queue_name: Option<&str>) -> Result<Vec<Job>, QueueError>;

    /// Jobs deferred to a future `run_at`, keyed by fire time.
    async fn defer_job(&self, job: Job) -> Result<(), QueueError>;
    /// Pops every deferred job whose `run_at` has passed.
    async fn due_deferred_jobs(&self) -> Result<Vec<Job>, QueueError>;

    async fn put_schedule(&self, schedule: Schedule) -> Result<(), QueueError>;
    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, QueueError>;
    async fn delete_schedule(&self, id: &str) -> Result<bool, QueueError>;
    async fn list_schedules(&self) -> Result<Vec<Schedule>, QueueError>;

    async fn put_worker(&self, worker: WorkerInfo) -> Result<(), QueueError>;
    async fn remove_worker(&self, worker_id: &str) -> Result<(), QueueError>;
    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, QueueError>;
}
