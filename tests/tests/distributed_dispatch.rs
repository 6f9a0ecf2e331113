//! End-to-end: a pipeline configured with the `distributed` executor hands
//! its node off to the job queue; a worker must be running for it to
//! ever make progress.

use flowerpower::{ExecutorType, FlowerPowerProject, PipelineModule, RunConfig};
use serde_json::Value;
use std::sync::Arc;

fn tripling_builder() -> flowerpower::PipelineGraphSpec {
    PipelineModule::new()
        .node("tripled", &["n"], Arc::new(|inputs| Ok(Value::from(inputs[0].as_i64().unwrap() * 3))))
        .build()
}

#[tokio::test]
async fn distributed_executor_runs_the_node_through_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let project = FlowerPowerProject::new(Some("dist-demo"), dir.path(), false).await.unwrap();
    project.pipeline_manager().new_pipeline("tripling", false).await.unwrap();
    project.pipeline_manager().module_registry().register("tripling", Arc::new(tripling_builder));
    project.pipeline_manager().queue().start_worker(true, None).await.unwrap();

    let mut run_config = RunConfig::default();
    run_config.inputs.insert("n".to_string(), Value::from(7));
    run_config.final_vars = vec!["tripled".to_string()];
    run_config.executor.executor_type = ExecutorType::Distributed;

    let outputs = project.run("tripling", Some(run_config)).await.unwrap();
    project.pipeline_manager().queue().stop_worker_pool().await.unwrap();

    assert_eq!(outputs["tripled"], Value::from(21));
}
