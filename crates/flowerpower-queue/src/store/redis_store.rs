//! Redis-backed `Store`. Connections are pooled via `deadpool-redis`, the
//! same `deadpool::managed` pattern the teacher uses for its HTTP
//! connection pool, swapped to a Redis-aware manager instead of a
//! hand-rolled one since `deadpool-redis` already ships one.

use super::Store;
use crate::error::QueueError;
use crate::types::{Job, Schedule, WorkerInfo};
use crate::wire::{decode, encode};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use flowerpower_core::JobId;
use redis::AsyncCommands;

pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisStore {
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, QueueError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Connection(e.into()))?;
        Ok(Self {
            pool,
            key_prefix: key_prefix.into(),
        })
    }

    fn key(&self, parts: &[&str]) -> String {
        let mut key = self.key_prefix.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, QueueError> {
        self.pool.get().await.map_err(|e| QueueError::Connection(e.into()))
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn push_job(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let job_key = self.key(&["job", &job.id.to_string()]);
        let queue_key = self.key(&["queue", &job.queue_name]);
        let bytes = encode(&job)?;
        let _: () = conn.set(&job_key, bytes).await.map_err(|e| QueueError::Connection(e.into()))?;
        let _: () = conn
            .rpush(&queue_key, job.id.to_string())
            .await
            .map_err(|e| QueueError::Connection(e.into()))?;
        Ok(())
    }

    async fn pop_job(&self, queue_name: &str) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn().await?;
        let queue_key = self.key(&["queue", queue_name]);
        let id: Option<String> = conn.lpop(&queue_key, None).await.map_err(|e| QueueError::Connection(e.into()))?;
        let Some(id) = id else { return Ok(None) };
        let job_key = self.key(&["job", &id]);
        let bytes: Option<Vec<u8>> = conn.get(&job_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        bytes.map(|b| decode(&b)).transpose()
    }

    async fn put_job(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let job_key = self.key(&["job", &job.id.to_string()]);
        let bytes = encode(&job)?;
        conn.set(&job_key, bytes).await.map_err(|e| QueueError::Connection(e.into()))
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn().await?;
        let job_key = self.key(&["job", &id.to_string()]);
        let bytes: Option<Vec<u8>> = conn.get(&job_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        bytes.map(|b| decode(&b)).transpose()
    }

    async fn delete_job(&self, id: &JobId) -> Result<bool, QueueError> {
        let mut conn = self.conn().await?;
        let job_key = self.key(&["job", &id.to_string()]);
        let removed: i64 = conn.del(&job_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        Ok(removed > 0)
    }

    async fn list_jobs(&self, queue_name: Option<&str>) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = match queue_name {
            Some(name) => {
                let queue_key = self.key(&["queue", name]);
                conn.lrange(&queue_key, 0, -1).await.map_err(|e| QueueError::Connection(e.into()))?
            }
            None => {
                let pattern = self.key(&["job", "*"]);
                let keys: Vec<String> = conn.keys(&pattern).await.map_err(|e| QueueError::Connection(e.into()))?;
                keys.into_iter()
                    .filter_map(|k| k.rsplit(':').next().map(|s| s.to_string()))
                    .collect()
            }
        };
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            let job_key = self.key(&["job", &id]);
            let bytes: Option<Vec<u8>> = conn.get(&job_key).await.map_err(|e| QueueError::Connection(e.into()))?;
            if let Some(bytes) = bytes {
                jobs.push(decode(&bytes)?);
            }
        }
        Ok(jobs)
    }

    async fn defer_job(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let job_key = self.key(&["job", &job.id.to_string()]);
        let deferred_key = self.key(&["deferred"]);
        let score = job.run_at.map(|at| at.timestamp() as f64).unwrap_or(0.0);
        let bytes = encode(&job)?;
        let _: () = conn.set(&job_key, bytes).await.map_err(|e| QueueError::Connection(e.into()))?;
        conn.zadd(&deferred_key, job.id.to_string(), score)
            .await
            .map_err(|e| QueueError::Connection(e.into()))
    }

    async fn due_deferred_jobs(&self) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.conn().await?;
        let deferred_key = self.key(&["deferred"]);
        let now = flowerpower_core::time::utc_now().timestamp() as f64;
        let due_ids: Vec<String> = conn
            .zrangebyscore(&deferred_key, f64::NEG_INFINITY, now)
            .await
            .map_err(|e| QueueError::Connection(e.into()))?;
        let mut jobs = Vec::with_capacity(due_ids.len());
        for id in &due_ids {
            let job_key = self.key(&["job", id]);
            let bytes: Option<Vec<u8>> = conn.get(&job_key).await.map_err(|e| QueueError::Connection(e.into()))?;
            if let Some(bytes) = bytes {
                jobs.push(decode(&bytes)?);
            }
        }
        if !due_ids.is_empty() {
            let _: () = conn.zrem(&deferred_key, due_ids).await.map_err(|e| QueueError::Connection(e.into()))?;
        }
        Ok(jobs)
    }

    async fn put_schedule(&self, schedule: Schedule) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let schedule_key = self.key(&["schedule", &schedule.id]);
        let schedules_key = self.key(&["schedules"]);
        let bytes = encode(&schedule)?;
        let _: () = conn.set(&schedule_key, bytes).await.map_err(|e| QueueError::Connection(e.into()))?;
        conn.sadd(&schedules_key, &schedule.id).await.map_err(|e| QueueError::Connection(e.into()))
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, QueueError> {
        let mut conn = self.conn().await?;
        let schedule_key = self.key(&["schedule", id]);
        let bytes: Option<Vec<u8>> = conn.get(&schedule_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        bytes.map(|b| decode(&b)).transpose()
    }

    async fn delete_schedule(&self, id: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn().await?;
        let schedule_key = self.key(&["schedule", id]);
        let schedules_key = self.key(&["schedules"]);
        let removed: i64 = conn.del(&schedule_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        let _: () = conn.srem(&schedules_key, id).await.map_err(|e| QueueError::Connection(e.into()))?;
        Ok(removed > 0)
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, QueueError> {
        let mut conn = self.conn().await?;
        let schedules_key = self.key(&["schedules"]);
        let ids: Vec<String> = conn.smembers(&schedules_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        let mut schedules = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(schedule) = self.get_schedule(&id).await? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }

    async fn put_worker(&self, worker: WorkerInfo) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let worker_key = self.key(&["worker", &worker.worker_id]);
        let workers_key = self.key(&["workers"]);
        let bytes = encode(&worker)?;
        let _: () = conn.set(&worker_key, bytes).await.map_err(|e| QueueError::Connection(e.into()))?;
        conn.sadd(&workers_key, &worker.worker_id).await.map_err(|e| QueueError::Connection(e.into()))
    }

    async fn remove_worker(&self, worker_id: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let worker_key = self.key(&["worker", worker_id]);
        let workers_key = self.key(&["workers"]);
        let _: () = conn.del(&worker_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        conn.srem(&workers_key, worker_id).await.map_err(|e| QueueError::Connection(e.into()))
    }

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, QueueError> {
        let mut conn = self.conn().await?;
        let workers_key = self.key(&["workers"]);
        let ids: Vec<String> = conn.smembers(&workers_key).await.map_err(|e| QueueError::Connection(e.into()))?;
        let mut workers = Vec::with_capacity(ids.len());
        for id in ids {
            let worker_key = self.key(&["worker", &id]);
            let bytes: Option<Vec<u8>> = conn.get(&worker_key).await.map_err(|e| QueueError::Connection(e.into()))?;
            if let Some(bytes) = bytes {
                workers.push(decode(&bytes)?);
            }
        }
        Ok(workers)
    }
}
