use super::Store;
use crate::error::QueueError;
use crate::types::{Job, Schedule, WorkerInfo};
use async_trait::async_trait;
use flowerpower_core::JobId;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    queues: HashMap<String, VecDeque<JobId>>,
    deferred: Vec<Job>,
    schedules: HashMap<String, Schedule>,
    workers: HashMap<String, WorkerInfo>,
}

/// Fully in-process backend: a plain `RwLock<HashMap<..>>`, matching
/// spec's "in-memory for tests" guidance and the "process-wide lock is
/// acceptable" concurrency note.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push_job(&self, job: Job) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;
        inner
            .queues
            .entry(job.queue_name.clone())
            .or_default()
            .push_back(job.id.clone());
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn pop_job(&self, queue_name: &str) -> Result<Option<Job>, QueueError> {
        let mut inner = self.inner.write().await;
        let Some(queue) = inner.queues.get_mut(queue_name) else {
            return Ok(None);
        };
        let Some(id) = queue.pop_front() else {
            return Ok(None);
        };
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn put_job(&self, job: Job) -> Result<(), QueueError> {
        self.inner.write().await.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.inner.read().await.jobs.get(id).cloned())
    }

    async fn delete_job(&self, id: &JobId) -> Result<bool, QueueError> {
        let mut inner = self.inner.write().await;
        let removed = inner.jobs.remove(id).is_some();
        for queue in inner.queues.values_mut() {
            queue.retain(|queued_id| queued_id != id);
        }
        Ok(removed)
    }

    async fn list_jobs(&self, queue_name: Option<&str>) -> Result<Vec<Job>, QueueError> {
        let inner = self.inner.read().await;
        match queue_name {
            Some(name) => Ok(inner
                .queues
                .get(name)
                .map(|ids| ids.iter().filter_map(|id| inner.jobs.get(id).cloned()).collect())
                .unwrap_or_default()),
            None => Ok(inner.jobs.values().cloned().collect()),
        }
    }

    async fn defer_job(&self, job: Job) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;
        inner.jobs.insert(job.id.clone(), job.clone());
        inner.deferred.push(job);
        Ok(())
    }

    async fn due_deferred_jobs(&self) -> Result<Vec<Job>, QueueError> {
        let now = flowerpower_core::time::utc_now();
        let mut inner = self.inner.write().await;
        let (due, pending): (Vec<Job>, Vec<Job>) = inner
            .deferred
            .drain(..)
            .partition(|job| job.run_at.map(|at| at <= now).unwrap_or(true));
        inner.deferred = pending;
        Ok(due)
    }

    async fn put_schedule(&self, schedule: Schedule) -> Result<(), QueueError> {
        self.inner.write().await.schedules.insert(schedule.id.clone(), schedule);
        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, QueueError> {
        Ok(self.inner.read().await.schedules.get(id).cloned())
    }

    async fn delete_schedule(&self, id: &str) -> Result<bool, QueueError> {
        Ok(self.inner.write().await.schedules.remove(id).is_some())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, QueueError> {
        Ok(self.inner.read().await.schedules.values().cloned().collect())
    }

    async fn put_worker(&self, worker: WorkerInfo) -> Result<(), QueueError> {
        self.inner.write().await.workers.insert(worker.worker_id.clone(), worker);
        Ok(())
    }

    async fn remove_worker(&self, worker_id: &str) -> Result<(), QueueError> {
        self.inner.write().await.workers.remove(worker_id);
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, QueueError> {
        Ok(self.inner.read().await.workers.values().cloned().collect())
    }
}
