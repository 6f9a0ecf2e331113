//! The `Pipeline` runtime object (spec's "runtime object" for C6): a loaded
//! pipeline ready to run, holding shared references to the project's
//! executor factory and adapter manager rather than owning its own.

use flowerpower_config::{PipelineConfig, RunConfig};
use flowerpower_pipeline::{InMemoryModuleSource, ModuleSource, PipelineError, PipelineGraphSpec, PipelineRunner};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies the project a pipeline was loaded under. `flowerpower-project`
/// constructs one per `FlowerPowerProject` and passes it down; kept here
/// (rather than depending on `flowerpower-project`) to avoid a crate cycle,
/// since `flowerpower-project` depends on this crate, not the reverse.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub name: String,
    pub base_dir: std::path::PathBuf,
}

/// A loaded pipeline: its config, its compiled DAG declaration, and the
/// runner that drives it through the project's shared executor/adapter
/// infrastructure.
pub struct Pipeline {
    pub name: String,
    pub config: PipelineConfig,
    pub project_context: ProjectContext,
    module: PipelineGraphSpec,
    runner: PipelineRunner,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("project_context", &self.project_context)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        config: PipelineConfig,
        project_context: ProjectContext,
        module: PipelineGraphSpec,
        executor_factory: Arc<flowerpower_pipeline::ExecutorFactory>,
        adapter_manager: Arc<flowerpower_pipeline::AdapterManager>,
    ) -> Self {
        let name = name.into();
        let runner = PipelineRunner::new(name.clone(), module.clone(), executor_factory, adapter_manager);
        Self {
            name,
            config,
            project_context,
            module,
            runner,
        }
    }

    pub fn module(&self) -> &PipelineGraphSpec {
        &self.module
    }

    /// Runs the pipeline with an explicit `RunConfig`, falling back to a
    /// `module_source` for any `additional_modules` the config requests.
    pub fn run(
        &self,
        run_config: &RunConfig,
        module_source: &dyn ModuleSource,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        self.runner.run(run_config, module_source)
    }

    pub async fn run_async(
        &self,
        run_config: &RunConfig,
        module_source: &dyn ModuleSource,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        self.runner.run_async(run_config, module_source).await
    }

    /// Runs with the pipeline's own persisted `config.run`, no additional
    /// modules resolvable beyond what the caller already loaded.
    pub fn run_with_default_config(&self) -> Result<HashMap<String, Value>, PipelineError> {
        self.run(&self.config.run, &InMemoryModuleSource::new())
    }
}
