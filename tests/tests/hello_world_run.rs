//! End-to-end: create a project, register a pipeline module, run it
//! synchronously, and confirm the result matches a direct computation.

use flowerpower::{FlowerPowerProject, PipelineModule, RunConfig};
use serde_json::Value;
use std::sync::Arc;

fn spend_mean_builder() -> flowerpower::PipelineGraphSpec {
    PipelineModule::new()
        .node(
            "spend_mean",
            &["spend"],
            Arc::new(|inputs| {
                let spend = inputs[0].as_array().expect("spend must be an array");
                let sum: f64 = spend.iter().map(|v| v.as_f64().unwrap_or(0.0)).sum();
                Ok(Value::from(sum / spend.len() as f64))
            }),
        )
        .build()
}

#[tokio::test]
async fn hello_world_run_returns_the_mean() {
    let dir = tempfile::tempdir().unwrap();
    let project = FlowerPowerProject::new(Some("hello"), dir.path(), false).await.unwrap();

    project.pipeline_manager().new_pipeline("hello", false).await.unwrap();
    project
        .pipeline_manager()
        .module_registry()
        .register("hello", Arc::new(spend_mean_builder));

    let mut run_config = RunConfig::default();
    run_config.inputs.insert("spend".to_string(), Value::from(vec![10, 20, 30]));
    run_config.final_vars = vec!["spend_mean".to_string()];

    let outputs = project.run("hello", Some(run_config)).await.unwrap();
    assert_eq!(outputs["spend_mean"], Value::from(20.0));
}

#[tokio::test]
async fn empty_final_vars_returns_every_terminal_node() {
    let dir = tempfile::tempdir().unwrap();
    let project = FlowerPowerProject::new(Some("hello"), dir.path(), false).await.unwrap();
    project.pipeline_manager().new_pipeline("hello", false).await.unwrap();
    project
        .pipeline_manager()
        .module_registry()
        .register("hello", Arc::new(spend_mean_builder));

    let mut run_config = RunConfig::default();
    run_config.inputs.insert("spend".to_string(), Value::from(vec![1, 2, 3]));

    let outputs = project.run("hello", Some(run_config)).await.unwrap();
    assert_eq!(outputs["spend_mean"], Value::from(2.0));
}
