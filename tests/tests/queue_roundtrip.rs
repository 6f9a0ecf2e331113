//! End-to-end: enqueue a pipeline run through the in-memory queue backend,
//! let a worker pick it up, and confirm the result matches a direct run.

use flowerpower::{FlowerPowerProject, JobStatus, PipelineModule, RunConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn doubling_builder() -> flowerpower::PipelineGraphSpec {
    PipelineModule::new()
        .node("doubled", &["n"], Arc::new(|inputs| Ok(Value::from(inputs[0].as_i64().unwrap() * 2))))
        .build()
}

async fn project_with_doubling_pipeline(dir: &std::path::Path) -> FlowerPowerProject {
    let project = FlowerPowerProject::new(Some("queue-demo"), dir, false).await.unwrap();
    project.pipeline_manager().new_pipeline("doubling", false).await.unwrap();
    project
        .pipeline_manager()
        .module_registry()
        .register("doubling", Arc::new(doubling_builder));
    project
}

#[tokio::test]
async fn enqueue_transitions_queued_to_succeeded_with_matching_result() {
    let dir = tempfile::tempdir().unwrap();
    let project = project_with_doubling_pipeline(dir.path()).await;
    project.pipeline_manager().queue().start_worker(true, None).await.unwrap();

    let mut run_config = RunConfig::default();
    run_config.inputs.insert("n".to_string(), Value::from(21));
    run_config.final_vars = vec!["doubled".to_string()];

    let direct = project.run("doubling", Some(run_config.clone())).await.unwrap();

    let job_id = project
        .pipeline_manager()
        .enqueue("doubling", run_config, None, None)
        .await
        .unwrap();

    let mut finished = None;
    for _ in 0..100 {
        if let Some(job) = project.pipeline_manager().queue().get_job(&job_id).await.unwrap() {
            if job.status.is_terminal() {
                finished = Some(job);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    project.pipeline_manager().queue().stop_worker_pool().await.unwrap();

    let finished = finished.expect("job did not finish in time");
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.retry_count, 0);

    let enqueued_outputs: std::collections::HashMap<String, Value> =
        serde_json::from_value(finished.result.unwrap()).unwrap();
    assert_eq!(enqueued_outputs, direct);
}
