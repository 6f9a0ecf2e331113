//! PipelineManager (C7): the façade `FlowerPowerProject` delegates to for
//! running, enqueuing, and scheduling pipelines, and for passing through
//! the registry's introspection operations.

use crate::error::ProjectError;
use flowerpower_config::RunConfig;
use flowerpower_core::JobId;
use flowerpower_queue::{AddJobParams, AddScheduleParams, JobFunctionRegistry, JobQueueManager, ScheduleTrigger};
use flowerpower_registry::{
    PipelineModuleRegistry, PipelineRegistry, PipelineRegistrySummary, PipelineSummary,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Job-function-registry name under which a pipeline's run closure is
/// registered: `run_pipeline::<name>`, carrying the same shape as spec's
/// "top-level `run_pipeline(name, run_config)` callable" without actually
/// needing a single shared function, since Rust resolves by name up front
/// rather than importing a module path at call time.
fn run_pipeline_function_reference(name: &str) -> String {
    format!("run_pipeline::{name}")
}

pub struct PipelineManager {
    registry: Arc<PipelineRegistry>,
    module_source: Arc<PipelineModuleRegistry>,
    queue: Arc<dyn JobQueueManager>,
    functions: Arc<JobFunctionRegistry>,
}

impl PipelineManager {
    pub fn new(
        registry: Arc<PipelineRegistry>,
        module_source: Arc<PipelineModuleRegistry>,
        queue: Arc<dyn JobQueueManager>,
        functions: Arc<JobFunctionRegistry>,
    ) -> Self {
        Self {
            registry,
            module_source,
            queue,
            functions,
        }
    }

    /// Resolves the pipeline via the registry and runs it. A `run_config`
    /// passed here wins over the pipeline's persisted `config.run` for any
    /// field it sets; the persisted config supplies everything else.
    pub async fn run(
        &self,
        name: &str,
        run_config: Option<RunConfig>,
    ) -> Result<HashMap<String, Value>, ProjectError> {
        if name.trim().is_empty() {
            return Err(ProjectError::EmptyPipelineName);
        }
        let reload = run_config.as_ref().map(|rc| rc.reload).unwrap_or(false);
        let pipeline = self.registry.get_pipeline(name, reload).await?;
        let mut resolved = match run_config {
            Some(rc) => pipeline.config.run.merge(&rc),
            None => pipeline.config.run.clone(),
        };
        // `run` is itself async, so it must drive the pipeline cooperatively
        // rather than through the blocking entry point, which spins its own
        // Tokio runtime and panics when called from inside one already
        // running (always true here). `execute()` behaves identically under
        // either entry point; only the legal-caller contract differs.
        resolved.async_driver = true;
        Ok(pipeline.run_async(&resolved, self.module_source.as_ref()).await?)
    }

    /// Registers `name`'s run closure (always fresh, so a reload or config
    /// edit is picked up on the next fire) and enqueues one execution of it.
    pub async fn enqueue(
        &self,
        name: &str,
        run_config: RunConfig,
        queue_name: Option<String>,
        job_id: Option<JobId>,
    ) -> Result<JobId, ProjectError> {
        if name.trim().is_empty() {
            return Err(ProjectError::EmptyPipelineName);
        }
        let function_reference = self.register_run_function(name);

        let mut kwargs = HashMap::new();
        kwargs.insert("run_config".to_string(), serde_json::to_value(&run_config)?);

        let params = AddJobParams {
            kwargs,
            queue_name,
            job_id,
            on_success: run_config.on_success.as_ref().map(|spec| spec.name.clone()),
            on_failure: run_config.on_failure.as_ref().map(|spec| spec.name.clone()),
            ..AddJobParams::new(function_reference)
        };
        let job = self.queue.add_job(params).await?;
        Ok(job.id)
    }

    /// Same wiring as `enqueue`, but the job is spawned repeatedly per
    /// `trigger` instead of once.
    pub async fn schedule(
        &self,
        name: &str,
        run_config: RunConfig,
        trigger: ScheduleTrigger,
        queue_name: Option<String>,
        schedule_id: Option<String>,
    ) -> Result<String, ProjectError> {
        if name.trim().is_empty() {
            return Err(ProjectError::EmptyPipelineName);
        }
        let function_reference = self.register_run_function(name);

        let mut kwargs = HashMap::new();
        kwargs.insert("run_config".to_string(), serde_json::to_value(&run_config)?);

        let params = AddScheduleParams {
            schedule_id,
            queue_name,
            kwargs,
            on_success: run_config.on_success.as_ref().map(|spec| spec.name.clone()),
            on_failure: run_config.on_failure.as_ref().map(|spec| spec.name.clone()),
            ..AddScheduleParams::new(function_reference, trigger)
        };
        let schedule = self.queue.add_schedule(params).await?;
        Ok(schedule.id)
    }

    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>, ProjectError> {
        Ok(self.registry.list_pipelines().await?)
    }

    pub async fn get_summary(
        &self,
        name: Option<&str>,
        cfg: bool,
        code: bool,
        project: bool,
    ) -> Result<PipelineRegistrySummary, ProjectError> {
        Ok(self.registry.get_summary(name, cfg, code, project).await?)
    }

    pub async fn new_pipeline(&self, name: &str, overwrite: bool) -> Result<(), ProjectError> {
        Ok(self.registry.new_pipeline(name, overwrite).await?)
    }

    pub async fn delete(&self, name: &str, cfg: bool, module: bool) -> Result<(), ProjectError> {
        Ok(self.registry.delete(name, cfg, module).await?)
    }

    pub fn queue(&self) -> &Arc<dyn JobQueueManager> {
        &self.queue
    }

    /// The name -> DAG-builder table `get_pipeline` resolves against.
    /// Callers register a pipeline's module here before running it, since
    /// the process has no source file to import the way the original did.
    pub fn module_registry(&self) -> &Arc<PipelineModuleRegistry> {
        &self.module_source
    }

    /// Builds and (re-)registers `name`'s run closure, returning its
    /// function reference. Always overwrites any prior registration, so a
    /// reloaded pipeline or edited module takes effect on the next fire.
    fn register_run_function(&self, name: &str) -> String {
        let function_reference = run_pipeline_function_reference(name);
        let registry = self.registry.clone();
        let module_source = self.module_source.clone();
        let name = name.to_string();

        self.functions.register(
            function_reference.clone(),
            Arc::new(move |_args, kwargs| {
                let run_config: RunConfig = match kwargs.get("run_config") {
                    Some(value) => serde_json::from_value(value.clone())?,
                    None => RunConfig::default(),
                };
                let registry = registry.clone();
                let module_source = module_source.clone();
                let name = name.clone();

                // The worker loop calls this closure synchronously from
                // inside its own tokio task; `futures::executor::block_on`
                // drives the pipeline to completion on that same task
                // without re-entering a nested Tokio runtime (which would
                // panic). `async_driver` is forced on for this invocation
                // only — `execute()` behaves identically either way, only
                // the entry point's blocking-vs-cooperative contract
                // differs, and we are always the cooperative caller here.
                let outputs: Result<HashMap<String, Value>, anyhow::Error> =
                    futures::executor::block_on(async move {
                        let pipeline = registry.get_pipeline(&name, run_config.reload).await?;
                        let mut run_config = run_config;
                        run_config.async_driver = true;
                        // Queued/scheduled runs fire their on_success/on_failure
                        // through the job's own callback fields (mapped at
                        // enqueue/schedule time) once the worker settles the
                        // job's terminal status, not through the runner itself,
                        // so the callback doesn't fire twice for one outcome.
                        run_config.on_success = None;
                        run_config.on_failure = None;
                        let outputs = pipeline.run_async(&run_config, module_source.as_ref()).await?;
                        Ok(outputs)
                    });
                Ok(serde_json::to_value(outputs?)?)
            }),
        );
        function_reference
    }
}
