//! PipelineRunner (C5): builds the DAG driver, invokes it, and returns
//! final variables.

use crate::adapter::AdapterManager;
use crate::dag::{Dag, PipelineGraphSpec};
use crate::error::PipelineError;
use flowerpower_config::{ConfigValidationError, RunConfig};
use flowerpower_retry::RetryManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::executor::ExecutorFactory;

/// Resolves an `additional_modules` entry to its declared graph. A pipeline
/// author's module registry implements this; `flowerpower-registry` is the
/// production implementation, backed by the pipelines directory.
pub trait ModuleSource: Send + Sync {
    /// Tries `"<name>"` then `"pipelines.<name>"`, mirroring the lookup
    /// order spec'd for additional-module resolution.
    fn resolve(&self, name: &str) -> Option<PipelineGraphSpec>;
}

/// An in-process module source for tests and simple embeddings, keyed by
/// exact name (no `pipelines.` prefix indirection needed when callers
/// already key by bare name).
#[derive(Default)]
pub struct InMemoryModuleSource {
    modules: HashMap<String, PipelineGraphSpec>,
}

impl InMemoryModuleSource {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: PipelineGraphSpec) {
        self.modules.insert(name.into(), spec);
    }
}

impl ModuleSource for InMemoryModuleSource {
    fn resolve(&self, name: &str) -> Option<PipelineGraphSpec> {
        self.modules.get(name).cloned()
    }
}

/// Merges the pipeline's primary module with its `additional_modules`,
/// additional modules first, primary module last so primary node
/// definitions win on name collision.
fn resolve_modules(
    primary: &PipelineGraphSpec,
    additional_modules: &[String],
    module_source: &dyn ModuleSource,
) -> Result<PipelineGraphSpec, PipelineError> {
    let mut nodes = Vec::new();
    for name in additional_modules {
        let tried = vec![name.clone(), format!("pipelines.{name}")];
        let resolved = module_source
            .resolve(name)
            .or_else(|| module_source.resolve(&format!("pipelines.{name}")));
        match resolved {
            Some(spec) => nodes.extend(spec.nodes),
            None => {
                return Err(PipelineError::ModuleImport {
                    requested: name.clone(),
                    tried,
                })
            }
        }
    }
    nodes.extend(primary.nodes.clone());
    Ok(PipelineGraphSpec { nodes })
}

/// Resolves `spec` (if any) against the process-wide callback registry and
/// invokes it once, carrying the pipeline name plus the outcome-specific
/// payload built by `result`. Used when a caller holds no project-scoped
/// `Runtime` to resolve against instead.
fn fire_callback(
    spec: &Option<flowerpower_config::CallbackSpec>,
    event: &str,
    pipeline_name: &str,
    result: impl FnOnce() -> Value,
) {
    let Some(spec) = spec else { return };
    let payload = flowerpower_core::CallbackPayload::new(
        event,
        serde_json::json!({
            "pipeline": pipeline_name,
            "result": result(),
            "args": spec.args,
            "kwargs": spec.kwargs,
        }),
    );
    flowerpower_core::DEFAULT_CALLBACKS.invoke(&spec.name, &payload);
}

/// Selects the requested final variables, or every terminal node when
/// `final_vars` is empty.
fn select_outputs(
    dag: &Dag,
    values: HashMap<String, Value>,
    final_vars: &[String],
) -> HashMap<String, Value> {
    let wanted: Vec<String> = if final_vars.is_empty() {
        dag.terminal_nodes()
    } else {
        final_vars.to_vec()
    };
    wanted
        .into_iter()
        .filter_map(|name| values.get(&name).cloned().map(|v| (name, v)))
        .collect()
}

pub struct PipelineRunner {
    pipeline_name: String,
    primary_module: PipelineGraphSpec,
    executor_factory: Arc<ExecutorFactory>,
    adapter_manager: Arc<AdapterManager>,
}

impl PipelineRunner {
    pub fn new(
        pipeline_name: impl Into<String>,
        primary_module: PipelineGraphSpec,
        executor_factory: Arc<ExecutorFactory>,
        adapter_manager: Arc<AdapterManager>,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            primary_module,
            executor_factory,
            adapter_manager,
        }
    }

    /// Synchronous entry point: blocks the calling thread. Internally
    /// drives the DAG on a dedicated current-thread runtime, since the DAG
    /// driver itself is always async underneath (to support the
    /// threadpool/processpool/distributed executor strategies uniformly).
    pub fn run(
        &self,
        run_config: &RunConfig,
        module_source: &dyn ModuleSource,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PipelineError::Execution {
                node: "<runtime>".to_string(),
                attempt: 0,
                source: anyhow::anyhow!(e),
            })?;
        rt.block_on(self.execute(run_config, module_source))
    }

    /// Cooperative entry point. Fails with `ConfigValidationError` if
    /// `async_driver` is not explicitly enabled — this never silently
    /// degrades to the synchronous path.
    pub async fn run_async(
        &self,
        run_config: &RunConfig,
        module_source: &dyn ModuleSource,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        if !run_config.async_driver {
            return Err(ConfigValidationError::AsyncDriverDisabled.into());
        }
        self.execute(run_config, module_source).await
    }

    async fn execute(
        &self,
        run_config: &RunConfig,
        module_source: &dyn ModuleSource,
    ) -> Result<HashMap<String, Value>, PipelineError> {
        match run_config.log_level {
            flowerpower_config::LogLevel::Debug => {
                tracing::debug!(pipeline = %self.pipeline_name, "applying run log level")
            }
            flowerpower_config::LogLevel::Info => {
                tracing::info!(pipeline = %self.pipeline_name, "applying run log level")
            }
            flowerpower_config::LogLevel::Warning => {
                tracing::warn!(pipeline = %self.pipeline_name, "applying run log level")
            }
            flowerpower_config::LogLevel::Error => {
                tracing::error!(pipeline = %self.pipeline_name, "applying run log level")
            }
        }

        let resolved = resolve_modules(
            &self.primary_module,
            &run_config.additional_modules,
            module_source,
        )?;
        let dag = Dag::build(&resolved)?;

        let (executor_handle, shutdown) = self.executor_factory.build(&run_config.executor)?;
        let adapters = self.adapter_manager.build(
            &run_config.with_adapter,
            &run_config.pipeline_adapter_cfg,
            &run_config.project_adapter_cfg,
            &[],
        )?;

        let retry = RetryManager::new(run_config.retry.clone());
        let context_name = self.pipeline_name.clone();
        let inputs = run_config.inputs.clone();
        let final_vars = run_config.final_vars.clone();
        let on_success_spec = run_config.on_success.clone();
        let on_failure_spec = run_config.on_failure.clone();

        // Both entry points drive retries through the async path: the DAG
        // driver is async underneath regardless of caller (needed to
        // support the threadpool/processpool/distributed strategies
        // uniformly). `run()` gets its "blocks the calling thread"
        // contract for free by owning the only task on a current-thread
        // runtime (see `run` above); `run_async()` runs cooperatively on
        // the caller's existing runtime.
        let result = retry
            .execute_async(
                &context_name,
                || {
                    let dag = &dag;
                    let executor = executor_handle.executor.as_ref();
                    let adapters = &adapters;
                    let inputs = inputs.clone();
                    async move { dag.execute(inputs, executor, adapters).await }
                },
                |outputs| {
                    fire_callback(&on_success_spec, "on_success", &context_name, || {
                        serde_json::json!(outputs)
                    });
                    Ok(())
                },
                |err| {
                    fire_callback(&on_failure_spec, "on_failure", &context_name, || {
                        Value::String(err.to_string())
                    });
                    Ok(())
                },
            )
            .await;

        shutdown.run();

        let values = result?;
        Ok(select_outputs(&dag, values, &final_vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::node::PipelineModule;
    use std::sync::Arc as StdArc;

    fn hello_module() -> PipelineGraphSpec {
        PipelineModule::new()
            .node(
                "spend_mean",
                &["spend"],
                StdArc::new(|inputs| {
                    let spend = inputs[0]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|v| v.as_f64().unwrap())
                        .collect::<Vec<_>>();
                    Ok(Value::from(spend.iter().sum::<f64>() / spend.len() as f64))
                }),
            )
            .build()
    }

    #[test]
    fn hello_world_synchronous_run() {
        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let mut run_config = RunConfig {
            final_vars: vec!["spend_mean".to_string()],
            ..RunConfig::default()
        };
        run_config
            .inputs
            .insert("spend".to_string(), Value::from(vec![10, 20, 30]));

        let module_source = InMemoryModuleSource::new();
        let outputs = runner.run(&run_config, &module_source).unwrap();
        assert_eq!(outputs["spend_mean"], Value::from(20.0));
    }

    #[test]
    fn on_success_callback_fires_exactly_once_on_successful_run() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let calls = StdArc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        flowerpower_core::DEFAULT_CALLBACKS.register("runner_test_on_success", move |_payload| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut run_config = RunConfig {
            final_vars: vec!["spend_mean".to_string()],
            on_success: Some(flowerpower_config::CallbackSpec::named("runner_test_on_success")),
            ..RunConfig::default()
        };
        run_config
            .inputs
            .insert("spend".to_string(), Value::from(vec![10, 20, 30]));

        let module_source = InMemoryModuleSource::new();
        runner.run(&run_config, &module_source).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        flowerpower_core::DEFAULT_CALLBACKS.unregister("runner_test_on_success");
    }

    #[test]
    fn on_failure_callback_fires_exactly_once_on_failed_run() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let calls = StdArc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        flowerpower_core::DEFAULT_CALLBACKS.register("runner_test_on_failure", move |_payload| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        // No "spend" input bound: the node's dependency is unresolved, so
        // the run fails without ever calling the node function.
        let run_config = RunConfig {
            final_vars: vec!["spend_mean".to_string()],
            on_failure: Some(flowerpower_config::CallbackSpec::named("runner_test_on_failure")),
            ..RunConfig::default()
        };

        let module_source = InMemoryModuleSource::new();
        let err = runner.run(&run_config, &module_source).unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedInput { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        flowerpower_core::DEFAULT_CALLBACKS.unregister("runner_test_on_failure");
    }

    #[tokio::test]
    async fn run_async_rejects_when_async_driver_disabled() {
        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let run_config = RunConfig::default();
        let module_source = InMemoryModuleSource::new();
        let result = runner.run_async(&run_config, &module_source).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_async_executes_when_enabled() {
        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let mut run_config = RunConfig {
            final_vars: vec!["spend_mean".to_string()],
            async_driver: true,
            ..RunConfig::default()
        };
        run_config
            .inputs
            .insert("spend".to_string(), Value::from(vec![10, 20, 30]));
        let module_source = InMemoryModuleSource::new();
        let outputs = runner.run_async(&run_config, &module_source).await.unwrap();
        assert_eq!(outputs["spend_mean"], Value::from(20.0));
    }

    #[test]
    fn missing_additional_module_lists_tried_names() {
        let runner = PipelineRunner::new(
            "hello",
            hello_module(),
            StdArc::new(ExecutorFactory::new()),
            StdArc::new(AdapterManager::new()),
        );
        let run_config = RunConfig {
            additional_modules: vec!["missing_mod".to_string()],
            ..RunConfig::default()
        };
        let module_source = InMemoryModuleSource::new();
        let err = runner.run(&run_config, &module_source).unwrap_err();
        match err {
            PipelineError::ModuleImport { tried, .. } => {
                assert_eq!(tried, vec!["missing_mod".to_string(), "pipelines.missing_mod".to_string()]);
            }
            other => panic!("expected ModuleImport, got {other:?}"),
        }
    }
}
