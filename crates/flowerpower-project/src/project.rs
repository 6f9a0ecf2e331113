//! FlowerPowerProject (C10): the project root object. Owns one
//! `PipelineManager` and injects itself back into it as `project_context`
//! (carried by `flowerpower_registry::pipeline::ProjectContext`, built
//! fresh per `Pipeline` rather than held as a live back-reference, since
//! Rust has no convenient "inject self after construction" idiom for a
//! struct that also needs to be `Arc`-shared).

use crate::dispatcher::QueueDispatcher;
use crate::error::ProjectError;
use crate::manager::PipelineManager;
use crate::runtime::Runtime;
use flowerpower_config::ProjectConfig;
use flowerpower_pipeline::{AdapterManager, ExecutorFactory};
use flowerpower_queue::JobFunctionRegistry;
use flowerpower_registry::{PipelineModuleRegistry, PipelineRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const README_TEMPLATE: &str = "# {name}\n\n\
A flowerpower project. Pipelines live under `pipelines/`, their configs \
under `conf/pipelines/`, and hooks under `hooks/`.\n";

pub struct FlowerPowerProject {
    name: String,
    base_dir: PathBuf,
    pipeline_manager: Arc<PipelineManager>,
}

impl std::fmt::Debug for FlowerPowerProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowerPowerProject")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl FlowerPowerProject {
    /// Creates a fresh project layout under `base_dir`. `overwrite=true`
    /// removes any existing `conf/`, `pipelines/`, `hooks/` directories
    /// first; otherwise an existing `conf/project.yml` is an error.
    pub async fn new(
        name: Option<&str>,
        base_dir: impl Into<PathBuf>,
        overwrite: bool,
    ) -> Result<Self, ProjectError> {
        let base_dir = base_dir.into();
        let project_yml = base_dir.join("conf").join("project.yml");

        if !overwrite && project_yml.exists() {
            return Err(ProjectError::AlreadyExists {
                path: base_dir.display().to_string(),
            });
        }
        if overwrite {
            for dir in ["conf", "pipelines", "hooks"] {
                let _ = tokio::fs::remove_dir_all(base_dir.join(dir)).await;
            }
        }

        let project_name = name.map(str::to_string).unwrap_or_else(|| default_project_name(&base_dir));

        tokio::fs::create_dir_all(base_dir.join("conf").join("pipelines")).await?;
        tokio::fs::create_dir_all(base_dir.join("pipelines")).await?;
        tokio::fs::create_dir_all(base_dir.join("hooks")).await?;

        let config = ProjectConfig::new(&project_name);
        tokio::fs::write(&project_yml, config.to_yaml_string()?).await?;
        tokio::fs::write(
            base_dir.join("README.md"),
            README_TEMPLATE.replace("{name}", &project_name),
        )
        .await?;

        Self::from_config(project_name, base_dir, config)
    }

    /// Loads an existing project, or returns `Ok(None)` if `base_dir` has
    /// no `conf/project.yml`.
    pub async fn load(base_dir: impl Into<PathBuf>) -> Result<Option<Self>, ProjectError> {
        let base_dir = base_dir.into();
        let project_yml = base_dir.join("conf").join("project.yml");
        if !project_yml.exists() {
            return Ok(None);
        }

        let text = tokio::fs::read_to_string(&project_yml).await?;
        let mut config = ProjectConfig::from_yaml_str(&text)?;
        config.apply_env_overlay()?;
        let name = config.name.clone();

        Ok(Some(Self::from_config(name, base_dir, config)?))
    }

    fn from_config(name: String, base_dir: PathBuf, config: ProjectConfig) -> Result<Self, ProjectError> {
        let functions = Arc::new(JobFunctionRegistry::new());
        let runtime = Runtime::default_handle();
        let queue = runtime.backends.create(&config.job_queue.r#type, &config.job_queue, functions.clone())?;

        let dispatcher = Arc::new(QueueDispatcher::new(queue.clone(), functions.clone()));
        let executor_factory = Arc::new(ExecutorFactory::new().with_distributed_dispatcher(dispatcher));
        let adapter_manager = Arc::new(AdapterManager::new());
        let module_registry = Arc::new(PipelineModuleRegistry::new());

        let pipeline_registry = Arc::new(PipelineRegistry::new(
            base_dir.clone(),
            name.clone(),
            module_registry.clone(),
            executor_factory,
            adapter_manager,
        ));

        let pipeline_manager = Arc::new(PipelineManager::new(pipeline_registry, module_registry, queue, functions));

        Ok(Self {
            name,
            base_dir,
            pipeline_manager,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pipeline_manager(&self) -> &Arc<PipelineManager> {
        &self.pipeline_manager
    }

    pub async fn run(
        &self,
        name: &str,
        run_config: Option<flowerpower_config::RunConfig>,
    ) -> Result<std::collections::HashMap<String, serde_json::Value>, ProjectError> {
        if name.trim().is_empty() {
            return Err(ProjectError::EmptyPipelineName);
        }
        self.pipeline_manager.run(name, run_config).await
    }
}

fn default_project_name(base_dir: &Path) -> String {
    base_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "flowerpower-project".to_string())
}
