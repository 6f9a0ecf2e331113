//! End-to-end: a schedule with a short interval trigger fires more than
//! once while the scheduler and a worker are running, and every spawned
//! job shares the schedule's id as its `group_id`.

use flowerpower::{FlowerPowerProject, PipelineModule, RunConfig, ScheduleTrigger};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn noop_builder() -> flowerpower::PipelineGraphSpec {
    PipelineModule::new().node("out", &[], Arc::new(|_| Ok(Value::from(1)))).build()
}

#[tokio::test]
async fn interval_schedule_spawns_multiple_jobs_sharing_the_schedule_id() {
    let dir = tempfile::tempdir().unwrap();
    let project = FlowerPowerProject::new(Some("schedule-demo"), dir.path(), false).await.unwrap();
    project.pipeline_manager().new_pipeline("noop", false).await.unwrap();
    project.pipeline_manager().module_registry().register("noop", Arc::new(noop_builder));

    let queue = project.pipeline_manager().queue().clone();
    queue.start_worker(true, None).await.unwrap();
    queue.start_scheduler(1).await.unwrap();

    let schedule_id = project
        .pipeline_manager()
        .schedule(
            "noop",
            RunConfig::default(),
            ScheduleTrigger::Interval { seconds: 1.0 },
            None,
            Some("s1".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(schedule_id, "s1");

    let mut history_len = 0;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(schedule) = queue.get_schedule(&schedule_id).await.unwrap() {
            history_len = schedule.history.len();
            if history_len >= 2 {
                break;
            }
        }
    }
    queue.stop_scheduler().await.unwrap();
    queue.stop_worker_pool().await.unwrap();

    assert!(history_len >= 2, "expected at least 2 fired jobs, got {history_len}");

    let schedule = queue.get_schedule(&schedule_id).await.unwrap().unwrap();
    let mut seen_ids = std::collections::HashSet::new();
    for job_id in &schedule.history {
        let job = queue.get_job(job_id).await.unwrap().expect("spawned job must be queryable");
        assert_eq!(job.group_id.as_deref(), Some("s1"));
        assert!(seen_ids.insert(job.id.clone()), "job ids must be distinct");
    }
}
