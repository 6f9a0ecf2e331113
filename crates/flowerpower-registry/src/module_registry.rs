//! In-process stand-in for the dynamic module import the original system
//! performs at `get_pipeline` time.
//!
//! A Rust process cannot import arbitrary source text the way a dynamic
//! language can; a pipeline's DAG must already be compiled in. The
//! equivalent boundary here is a name -> builder-function table: pipeline
//! authors call `PipelineModuleRegistry::register(name, builder)` once at
//! startup (or from a build script / `inventory`-style registration, left to
//! the embedding application), and `PipelineRegistry::get_pipeline` resolves
//! against that table instead of importing a file.

use flowerpower_pipeline::{ModuleSource, PipelineGraphSpec};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Builds a fresh `PipelineGraphSpec` for a registered pipeline. Called once
/// per `get_pipeline`/`reload`, mirroring "discards cached module and
/// reimports."
pub type ModuleBuilder = Arc<dyn Fn() -> PipelineGraphSpec + Send + Sync>;

#[derive(Default)]
pub struct PipelineModuleRegistry {
    builders: RwLock<HashMap<String, ModuleBuilder>>,
}

impl PipelineModuleRegistry {
    pub fn new() -> Self {
        Self {
            builders: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: impl Into<String>, builder: ModuleBuilder) {
        self.builders
            .write()
            .expect("module registry lock poisoned")
            .insert(name.into(), builder);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.builders
            .read()
            .expect("module registry lock poisoned")
            .contains_key(name)
    }

    pub fn build(&self, name: &str) -> Option<PipelineGraphSpec> {
        let builders = self.builders.read().expect("module registry lock poisoned");
        builders.get(name).map(|builder| builder())
    }
}

/// Adapts the registry to `flowerpower_pipeline::ModuleSource` so it can
/// resolve a `RunConfig.additional_modules` entry the same way it resolves a
/// pipeline's primary module.
impl ModuleSource for PipelineModuleRegistry {
    fn resolve(&self, name: &str) -> Option<PipelineGraphSpec> {
        self.build(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowerpower_pipeline::PipelineModule;

    #[test]
    fn register_then_build_returns_fresh_spec_each_time() {
        let registry = PipelineModuleRegistry::new();
        registry.register(
            "hello",
            Arc::new(|| PipelineModule::new().node("a", &[], Arc::new(|_| Ok(0.into()))).build()),
        );
        assert!(registry.is_registered("hello"));
        let spec = registry.build("hello").unwrap();
        assert_eq!(spec.node_names(), vec!["a"]);
    }

    #[test]
    fn unregistered_name_returns_none() {
        let registry = PipelineModuleRegistry::new();
        assert!(registry.build("missing").is_none());
    }
}
