//! Process-wide registries a project draws on: the callback registry (C11)
//! and the job-queue backend registry (C12). Grounded on
//! `flowerpower_core::DEFAULT_CALLBACKS`'s `once_cell::sync::Lazy` pattern —
//! a `Runtime` is reachable either as an explicit handle passed around by
//! the embedding application, or via `Runtime::default_handle()` for
//! ergonomic startup registration without threading a handle everywhere.

use flowerpower_core::CallbackRegistry;
use flowerpower_queue::BackendRegistry;
use once_cell::sync::Lazy;
use std::sync::Arc;

pub struct Runtime {
    pub callbacks: Arc<CallbackRegistry>,
    pub backends: Arc<BackendRegistry>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(CallbackRegistry::new()),
            backends: Arc::new(BackendRegistry::new()),
        }
    }

    /// The lazily-initialized process-wide default, for callers that never
    /// construct their own `FlowerPowerProject` `Runtime` explicitly.
    pub fn default_handle() -> &'static Runtime {
        static DEFAULT: Lazy<Runtime> = Lazy::new(Runtime::new);
        &DEFAULT
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_preregisters_built_in_backends() {
        let runtime = Runtime::default_handle();
        assert_eq!(runtime.backends.list_available(), vec!["memory".to_string(), "redis".to_string()]);
    }
}
