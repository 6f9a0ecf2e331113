//! Process-wide registry of named callbacks.
//!
//! Pipeline runs and job-queue workers can fire callbacks identified by
//! name (`on_success`, `on_failure`, job-level hooks, ...). Rather than
//! threading a callback value through every config struct, callers
//! register a closure once under a name and refer to it by that name from
//! YAML or from code. Resolution happens at invocation time, so a
//! callback can be registered after the config that references it has
//! already been loaded.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The payload handed to a registered callback.
#[derive(Debug, Clone)]
pub struct CallbackPayload {
    /// Name of the event that fired, e.g. `"on_success"`, `"on_failure"`.
    pub event: String,
    /// Free-form structured context (pipeline name, job id, error message, ...).
    pub context: Value,
}

impl CallbackPayload {
    pub fn new(event: impl Into<String>, context: Value) -> Self {
        Self {
            event: event.into(),
            context,
        }
    }
}

pub type CallbackFn = dyn Fn(&CallbackPayload) + Send + Sync;

/// A process-wide map from callback name to handler.
///
/// Invocation never propagates a handler panic or returns an error to the
/// caller: a failing callback is logged and swallowed, mirroring how
/// retry's own success/failure hooks are isolated from the outcome they
/// report on.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<String, Arc<CallbackFn>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `handler` under `name`, replacing any previous registration.
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().expect("callback registry poisoned");
        handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn unregister(&self, name: &str) {
        let mut handlers = self.handlers.write().expect("callback registry poisoned");
        handlers.remove(name);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers
            .read()
            .expect("callback registry poisoned")
            .contains_key(name)
    }

    /// Invokes the callback registered under `name`, if any. Returns
    /// whether a handler was found and invoked.
    pub fn invoke(&self, name: &str, payload: &CallbackPayload) -> bool {
        let handler = self
            .handlers
            .read()
            .expect("callback registry poisoned")
            .get(name)
            .cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => {
                tracing::trace!(callback = name, "no handler registered, skipping");
                false
            }
        }
    }
}

/// The default process-wide registry, used when callers do not hold a
/// handle to a project-scoped `Runtime`.
pub static DEFAULT_CALLBACKS: Lazy<CallbackRegistry> = Lazy::new(CallbackRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn invoke_calls_registered_handler_exactly_once() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        registry.register("on_success", move |_payload| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let fired = registry.invoke(
            "on_success",
            &CallbackPayload::new("on_success", Value::Null),
        );

        assert!(fired);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoke_on_unregistered_name_is_a_no_op() {
        let registry = CallbackRegistry::new();
        let fired = registry.invoke("missing", &CallbackPayload::new("missing", Value::Null));
        assert!(!fired);
    }

    #[test]
    fn register_replaces_previous_handler() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register("hook", |_| {});
        let calls_clone = calls.clone();
        registry.register("hook", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.invoke("hook", &CallbackPayload::new("hook", Value::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
