//! JobQueueBackend (C8): owns the connection to the broker and advertises
//! what it can do.

use crate::error::QueueError;
use crate::store::{MemoryStore, RedisStore, Store};
use crate::types::BackendCapabilities;
use flowerpower_config::JobQueueConfig;
use std::sync::Arc;

pub trait JobQueueBackend: Send + Sync {
    /// The store operations are run against. Lazily constructed at backend
    /// build time, not per-call, since both concrete backends hold their
    /// connection/pool for the backend's whole lifetime.
    fn store(&self) -> Arc<dyn Store>;

    /// Ordered queue names; the last is reserved for scheduled-job deferral.
    fn queues(&self) -> &[String];

    fn deferred_queue(&self) -> &str {
        self.queues().last().map(|s| s.as_str()).unwrap_or("scheduled")
    }

    fn num_workers(&self) -> usize;

    fn capabilities(&self) -> BackendCapabilities;
}

pub struct MemoryBackend {
    store: Arc<MemoryStore>,
    queues: Vec<String>,
    num_workers: usize,
}

impl MemoryBackend {
    pub fn new(config: &JobQueueConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            queues: config.queues.clone(),
            num_workers: config.num_workers,
        }
    }
}

impl JobQueueBackend for MemoryBackend {
    fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn queues(&self) -> &[String] {
        &self.queues
    }

    fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::memory()
    }
}

pub struct RedisBackend {
    store: Arc<RedisStore>,
    queues: Vec<String>,
    num_workers: usize,
}

impl RedisBackend {
    pub fn new(config: &JobQueueConfig) -> Result<Self, QueueError> {
        let scheme = if config.tls { "rediss" } else { "redis" };
        let mut url = format!("{scheme}://");
        if let Some(username) = &config.username {
            url.push_str(username);
            if let Some(password) = &config.password {
                url.push(':');
                url.push_str(password);
            }
            url.push('@');
        }
        url.push_str(&format!("{}:{}/{}", config.host, config.port, config.database));

        Ok(Self {
            store: Arc::new(RedisStore::new(&url, config.key_prefix.clone())?),
            queues: config.queues.clone(),
            num_workers: config.num_workers,
        })
    }
}

impl JobQueueBackend for RedisBackend {
    fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn queues(&self) -> &[String] {
        &self.queues
    }

    fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::redis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_advertises_reduced_durability() {
        let backend = MemoryBackend::new(&JobQueueConfig::default());
        assert!(!backend.capabilities().durable);
        assert_eq!(backend.deferred_queue(), "scheduled");
    }
}
