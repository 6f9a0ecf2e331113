//! PipelineRegistry (C6): creates/deletes/lists pipelines on the
//! filesystem, and loads `Pipeline` runtime objects and their configs.
//!
//! Filesystem operations go through `tokio::fs`; `list_pipelines` reads
//! directory metadata (`modified`/`len`), mirroring the original's file-stat
//! introspection without adopting its pluggable-filesystem abstraction.
//! `get_pipeline` caches loaded `Pipeline` objects behind a
//! `tokio::sync::RwLock<HashMap<String, Arc<Pipeline>>>`, consistent with
//! "a process-wide lock is acceptable" for the shared module cache.

use crate::error::RegistryError;
use crate::module_registry::PipelineModuleRegistry;
use crate::pipeline::{Pipeline, ProjectContext};
use flowerpower_config::{PipelineConfig, ProjectConfig};
use flowerpower_pipeline::{AdapterManager, ExecutorFactory};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const PIPELINE_TEMPLATE: &str = r#"// Pipeline module scaffold.
//
// Register this pipeline's DAG with the project's `PipelineModuleRegistry`
// before calling `PipelineRegistry::get_pipeline`, e.g.:
//
//   registry.register("NAME", Arc::new(|| {
//       PipelineModule::new()
//           .node("example", &[], Arc::new(|_inputs| Ok(serde_json::Value::Null)))
//           .build()
//   }));
"#;

fn hook_template(hook_type: &str, function_name: &str) -> String {
    format!(
        "// {hook_type} hook: {function_name}\n\
         // Register via the project's CallbackRegistry, e.g.:\n\
         // DEFAULT_CALLBACKS.register(\"{function_name}\", Arc::new(|payload| {{ /* ... */ }}));\n"
    )
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub name: String,
    pub path: PathBuf,
    pub last_modified: chrono::DateTime<chrono::Utc>,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSummaryDetail {
    pub cfg: Option<PipelineConfig>,
    pub module_source: Option<String>,
}

pub struct PipelineRegistrySummary {
    pub pipelines: HashMap<String, PipelineSummaryDetail>,
    pub project: Option<ProjectConfig>,
}

pub struct PipelineRegistry {
    base_dir: PathBuf,
    project_name: String,
    module_registry: Arc<PipelineModuleRegistry>,
    executor_factory: Arc<ExecutorFactory>,
    adapter_manager: Arc<AdapterManager>,
    cache: RwLock<HashMap<String, Arc<Pipeline>>>,
}

impl PipelineRegistry {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        module_registry: Arc<PipelineModuleRegistry>,
        executor_factory: Arc<ExecutorFactory>,
        adapter_manager: Arc<AdapterManager>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            project_name: project_name.into(),
            module_registry,
            executor_factory,
            adapter_manager,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn pipelines_dir(&self) -> PathBuf {
        self.base_dir.join("pipelines")
    }

    fn cfg_dir(&self) -> PathBuf {
        self.base_dir.join("conf").join("pipelines")
    }

    fn hooks_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join("hooks").join(name)
    }

    fn module_path(&self, name: &str) -> PathBuf {
        self.pipelines_dir().join(format!("{name}.rs"))
    }

    fn cfg_path(&self, name: &str) -> PathBuf {
        self.cfg_dir().join(format!("{name}.yml"))
    }

    fn check_identifier(name: &str) -> Result<(), RegistryError> {
        if !PipelineConfig::is_valid_identifier(name) {
            return Err(RegistryError::InvalidIdentifier {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Creates `<pipelines_dir>/<name>.rs` (scaffold) and
    /// `<cfg_dir>/<name>.yml` (default `PipelineConfig`). Fails if either
    /// exists unless `overwrite` is set, in which case both are replaced.
    pub async fn new_pipeline(&self, name: &str, overwrite: bool) -> Result<(), RegistryError> {
        Self::check_identifier(name)?;

        let module_path = self.module_path(name);
        let cfg_path = self.cfg_path(name);

        if !overwrite && (module_path.exists() || cfg_path.exists()) {
            return Err(RegistryError::AlreadyExists {
                name: name.to_string(),
                path: module_path.display().to_string(),
            });
        }

        tokio::fs::create_dir_all(self.pipelines_dir()).await?;
        tokio::fs::create_dir_all(self.cfg_dir()).await?;

        tokio::fs::write(&module_path, PIPELINE_TEMPLATE).await?;
        let cfg = PipelineConfig::new(name);
        tokio::fs::write(&cfg_path, cfg.to_yaml_string()?).await?;

        self.cache.write().await.remove(name);
        Ok(())
    }

    /// Removes the matching module/config files. Missing files are logged
    /// and skipped, never treated as a failure.
    pub async fn delete(&self, name: &str, cfg: bool, module: bool) -> Result<(), RegistryError> {
        if module {
            remove_if_present(&self.module_path(name)).await?;
        }
        if cfg {
            remove_if_present(&self.cfg_path(name)).await?;
        }
        self.cache.write().await.remove(name);
        Ok(())
    }

    /// Every `.rs` file under the pipelines directory, with file-stat
    /// metadata. Returns an empty list if the directory does not exist yet.
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>, RegistryError> {
        let dir = self.pipelines_dir();
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("rs") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            let last_modified = metadata
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());
            out.push(PipelineSummary {
                name: name.to_string(),
                path,
                last_modified,
                size: metadata.len(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Loads the config and DAG declaration for `name`, constructing a
    /// `Pipeline`. Cached across calls; `reload=true` discards the cached
    /// entry and the registered module builder's output is rebuilt fresh.
    pub async fn get_pipeline(&self, name: &str, reload: bool) -> Result<Arc<Pipeline>, RegistryError> {
        if reload {
            self.cache.write().await.remove(name);
        }
        if let Some(pipeline) = self.cache.read().await.get(name) {
            return Ok(pipeline.clone());
        }

        let cfg_path = self.cfg_path(name);
        let config = if cfg_path.exists() {
            let text = tokio::fs::read_to_string(&cfg_path).await?;
            PipelineConfig::from_yaml_str(&text)?
        } else {
            PipelineConfig::new(name)
        };
        config.validate()?;

        let module = self
            .module_registry
            .build(name)
            .ok_or_else(|| RegistryError::ModuleNotRegistered {
                name: name.to_string(),
            })?;

        let pipeline = Arc::new(Pipeline::new(
            name,
            config,
            ProjectContext {
                name: self.project_name.clone(),
                base_dir: self.base_dir.clone(),
            },
            module,
            self.executor_factory.clone(),
            self.adapter_manager.clone(),
        ));

        self.cache.write().await.insert(name.to_string(), pipeline.clone());
        Ok(pipeline)
    }

    /// Summarizes one pipeline (or all, when `name` is `None`). `code=true`
    /// includes the scaffold source text; `project=true` also loads the
    /// project config.
    pub async fn get_summary(
        &self,
        name: Option<&str>,
        cfg: bool,
        code: bool,
        project: bool,
    ) -> Result<PipelineRegistrySummary, RegistryError> {
        let names: Vec<String> = match name {
            Some(n) => vec![n.to_string()],
            None => self
                .list_pipelines()
                .await?
                .into_iter()
                .map(|p| p.name)
                .collect(),
        };

        let mut pipelines = HashMap::new();
        for n in names {
            let loaded_cfg = if cfg {
                let path = self.cfg_path(&n);
                if path.exists() {
                    let text = tokio::fs::read_to_string(&path).await?;
                    Some(PipelineConfig::from_yaml_str(&text)?)
                } else {
                    None
                }
            } else {
                None
            };
            let module_source = if code {
                let path = self.module_path(&n);
                tokio::fs::read_to_string(&path).await.ok()
            } else {
                None
            };
            pipelines.insert(
                n,
                PipelineSummaryDetail {
                    cfg: loaded_cfg,
                    module_source,
                },
            );
        }

        let project_cfg = if project {
            let path = self.base_dir.join("conf").join("project.yml");
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => Some(ProjectConfig::from_yaml_str(&text)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        Ok(PipelineRegistrySummary {
            pipelines,
            project: project_cfg,
        })
    }

    /// Appends a hook template to `hooks/<name>/hook.rs`, or to `to` if
    /// given.
    pub async fn add_hook(
        &self,
        name: &str,
        hook_type: &str,
        function_name: Option<&str>,
        to: Option<&Path>,
    ) -> Result<(), RegistryError> {
        let function_name = function_name.unwrap_or("on_hook");
        let path = match to {
            Some(path) => path.to_path_buf(),
            None => self.hooks_dir(name).join("hook.rs"),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let template = hook_template(hook_type, function_name);
        let mut existing = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        existing.push_str(&template);
        tokio::fs::write(&path, existing).await?;
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> Result<(), RegistryError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "file not present, skipping delete");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowerpower_pipeline::PipelineModule;

    fn new_registry(base_dir: &Path) -> PipelineRegistry {
        PipelineRegistry::new(
            base_dir,
            "test-project",
            Arc::new(PipelineModuleRegistry::new()),
            Arc::new(ExecutorFactory::new()),
            Arc::new(AdapterManager::new()),
        )
    }

    #[tokio::test]
    async fn new_pipeline_creates_module_and_config_then_rejects_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());

        registry.new_pipeline("hello", false).await.unwrap();
        assert!(registry.module_path("hello").exists());
        assert!(registry.cfg_path("hello").exists());

        let err = registry.new_pipeline("hello", false).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists { .. }));

        registry.new_pipeline("hello", true).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_identifier_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());
        let err = registry.new_pipeline("2bad", false).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidIdentifier { .. }));
    }

    #[tokio::test]
    async fn delete_missing_files_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());
        registry.delete("missing", true, true).await.unwrap();
    }

    #[tokio::test]
    async fn list_pipelines_reports_created_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());
        registry.new_pipeline("a", false).await.unwrap();
        registry.new_pipeline("b", false).await.unwrap();

        let summaries = registry.list_pipelines().await.unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn get_pipeline_fails_without_a_registered_module_builder() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());
        registry.new_pipeline("hello", false).await.unwrap();

        let err = registry.get_pipeline("hello", false).await.unwrap_err();
        assert!(matches!(err, RegistryError::ModuleNotRegistered { .. }));
    }

    #[tokio::test]
    async fn get_pipeline_succeeds_once_module_is_registered_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let module_registry = Arc::new(PipelineModuleRegistry::new());
        module_registry.register(
            "hello",
            Arc::new(|| PipelineModule::new().node("a", &[], Arc::new(|_| Ok(1.into()))).build()),
        );
        let registry = PipelineRegistry::new(
            dir.path(),
            "test-project",
            module_registry,
            Arc::new(ExecutorFactory::new()),
            Arc::new(AdapterManager::new()),
        );
        registry.new_pipeline("hello", false).await.unwrap();

        let pipeline = registry.get_pipeline("hello", false).await.unwrap();
        assert_eq!(pipeline.name, "hello");
        let pipeline_again = registry.get_pipeline("hello", false).await.unwrap();
        assert!(Arc::ptr_eq(&pipeline, &pipeline_again));
    }

    #[tokio::test]
    async fn add_hook_appends_template_to_hook_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = new_registry(dir.path());
        registry.add_hook("hello", "on_success", Some("notify"), None).await.unwrap();
        let text = tokio::fs::read_to_string(registry.hooks_dir("hello").join("hook.rs"))
            .await
            .unwrap();
        assert!(text.contains("notify"));
    }
}
