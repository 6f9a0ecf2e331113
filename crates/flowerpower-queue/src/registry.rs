//! Backend Registry (C12): maps a backend name (`"memory"`, `"redis"`) to a
//! factory that builds a ready-to-use `JobQueueManager`, mirroring the
//! registry/factory split the teacher uses for its MCP tool registry.

use crate::backend::{JobQueueBackend, MemoryBackend, RedisBackend};
use crate::error::QueueError;
use crate::manager::{JobFunctionRegistry, JobQueueManager, JobQueueManagerImpl};
use flowerpower_config::JobQueueConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Builds a fresh `JobQueueManager` from a config. Boxed rather than a
/// plain fn pointer so backends registered from outside the crate can close
/// over extra state (e.g. a shared `JobFunctionRegistry`).
pub type BackendFactory =
    Arc<dyn Fn(&JobQueueConfig, Arc<JobFunctionRegistry>) -> Result<Arc<dyn JobQueueManager>, QueueError> + Send + Sync>;

pub struct BackendRegistry {
    factories: RwLock<HashMap<String, BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        let registry = Self {
            factories: RwLock::new(HashMap::new()),
        };
        registry
            .register("memory", Arc::new(|config, functions| {
                let backend = MemoryBackend::new(config);
                Ok(manager_from_backend(backend, functions))
            }))
            .expect("built-in 'memory' backend registers exactly once");
        registry
            .register("redis", Arc::new(|config, functions| {
                let backend = RedisBackend::new(config)?;
                Ok(manager_from_backend(backend, functions))
            }))
            .expect("built-in 'redis' backend registers exactly once");
        registry
    }

    pub fn register(&self, name: impl Into<String>, factory: BackendFactory) -> Result<(), QueueError> {
        let name = name.into();
        let mut factories = self.factories.write().expect("lock poisoned");
        if factories.contains_key(&name) {
            return Err(QueueError::BackendAlreadyRegistered(name));
        }
        factories.insert(name, factory);
        Ok(())
    }

    pub fn create(
        &self,
        name: &str,
        config: &JobQueueConfig,
        functions: Arc<JobFunctionRegistry>,
    ) -> Result<Arc<dyn JobQueueManager>, QueueError> {
        let factory = self
            .factories
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::UnknownBackend(name.to_string()))?;
        factory(config, functions)
    }

    pub fn list_available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().expect("lock poisoned").keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn manager_from_backend<B: JobQueueBackend + 'static>(
    backend: B,
    functions: Arc<JobFunctionRegistry>,
) -> Arc<dyn JobQueueManager> {
    // `Store` comes back as a trait object (`Arc<dyn Store>`), so the
    // manager is instantiated over that object type directly rather than
    // over `MemoryStore`/`RedisStore` themselves.
    Arc::new(JobQueueManagerImpl::new(backend.store(), backend.queues().to_vec(), functions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_backends_are_preregistered() {
        let registry = BackendRegistry::new();
        assert_eq!(registry.list_available(), vec!["memory".to_string(), "redis".to_string()]);
    }

    #[test]
    fn registering_a_duplicate_name_fails() {
        let registry = BackendRegistry::new();
        let err = registry
            .register("memory", Arc::new(|config, functions| {
                let backend = MemoryBackend::new(config);
                Ok(manager_from_backend(backend, functions))
            }))
            .unwrap_err();
        assert!(matches!(err, QueueError::BackendAlreadyRegistered(name) if name == "memory"));
    }

    #[test]
    fn create_with_unknown_name_fails() {
        let registry = BackendRegistry::new();
        let err = registry
            .create("nonexistent", &JobQueueConfig::default(), Arc::new(JobFunctionRegistry::new()))
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownBackend(name) if name == "nonexistent"));
    }

    #[test]
    fn create_memory_backend_succeeds() {
        let registry = BackendRegistry::new();
        let manager = registry.create("memory", &JobQueueConfig::default(), Arc::new(JobFunctionRegistry::new()));
        assert!(manager.is_ok());
    }
}
