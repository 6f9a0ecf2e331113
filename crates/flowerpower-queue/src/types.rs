//! Job, Schedule, and the capability/worker bookkeeping types shared by
//! every backend.

use flowerpower_core::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A job's place in its lifecycle. `scheduled` is reserved for a schedule's
/// not-yet-fired child jobs; `paused` belongs to `Schedule`, not `Job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
    Scheduled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    Paused,
    Cancelled,
}

/// `retry` as accepted by `add_job`: either a bare attempt count or an
/// explicit `{max, interval}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySpec {
    pub max: u32,
    pub interval_secs: f64,
}

impl RetrySpec {
    pub fn none() -> Self {
        Self {
            max: 0,
            interval_secs: 0.0,
        }
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::none()
    }
}

/// `repeat` as accepted by `add_job`/`add_schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RepeatSpec {
    pub max: Option<u32>,
    pub interval_secs: Option<f64>,
}

/// One of `cron` / `interval` / `date`, exactly one populated per spec §4.9.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleTrigger {
    Cron {
        expression: String,
        use_local_time_zone: bool,
    },
    Interval {
        seconds: f64,
    },
    Date {
        at: chrono::DateTime<chrono::Utc>,
    },
}

/// How `add_schedule` handles a `schedule_id` collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    Reject,
    Replace,
    #[default]
    DoNothing,
}

/// How a schedule handles a fire missed by more than `misfire_grace_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MisfirePolicy {
    Drop,
    #[default]
    Latest,
}

/// One queued execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub function_reference: String,
    pub args: Vec<Value>,
    pub kwargs: HashMap<String, Value>,
    pub queue_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub retry: RetrySpec,
    pub retry_count: u32,
    pub worker_id: Option<String>,
    pub meta: HashMap<String, Value>,
    pub result_ttl_secs: Option<f64>,
    pub ttl_secs: Option<f64>,
    pub timeout_secs: Option<f64>,
    pub failure_ttl_secs: Option<f64>,
    pub group_id: Option<String>,
    pub run_at: Option<chrono::DateTime<chrono::Utc>>,
    pub on_success: Option<String>,
    pub on_failure: Option<String>,
    pub on_stopped: Option<String>,
}

impl Job {
    pub fn new(function_reference: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            function_reference: function_reference.into(),
            args: Vec::new(),
            kwargs: HashMap::new(),
            queue_name: queue_name.into(),
            created_at: flowerpower_core::time::utc_now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            retry: RetrySpec::none(),
            retry_count: 0,
            worker_id: None,
            meta: HashMap::new(),
            result_ttl_secs: None,
            ttl_secs: None,
            timeout_secs: None,
            failure_ttl_secs: None,
            group_id: None,
            run_at: None,
            on_success: None,
            on_failure: None,
            on_stopped: None,
        }
    }
}

/// A recurring or future-scheduled job specification. Spawns child `Job`s
/// at each fire time, correlated by `group_id = schedule.id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub status: ScheduleStatus,
    pub trigger: ScheduleTrigger,
    pub function_reference: String,
    pub args: Vec<Value>,
    pub kwargs: HashMap<String, Value>,
    pub queue_name: String,
    pub ttl_secs: Option<f64>,
    pub result_ttl_secs: Option<f64>,
    pub repeat: RepeatSpec,
    pub timeout_secs: Option<f64>,
    pub meta: HashMap<String, Value>,
    pub misfire_grace_time_secs: f64,
    pub misfire_policy: MisfirePolicy,
    pub next_fire_at: Option<chrono::DateTime<chrono::Utc>>,
    pub fire_count: u32,
    /// ids of jobs spawned by this schedule, most recent last; the basis for
    /// `get_schedule_result`'s index/slice lookups.
    pub history: Vec<JobId>,
    /// Carried onto every job this schedule spawns.
    pub on_success: Option<String>,
    pub on_failure: Option<String>,
}

/// Boolean capability set a `JobQueueBackend` advertises, per §3/§4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    pub supports_scheduling: bool,
    pub supports_cancellation: bool,
    pub supports_queue_inspection: bool,
    pub supports_result_fetching: bool,
    pub supports_worker_stats: bool,
    pub supports_priorities: bool,
    pub durable: bool,
}

impl BackendCapabilities {
    pub fn memory() -> Self {
        Self {
            supports_scheduling: true,
            supports_cancellation: true,
            supports_queue_inspection: true,
            supports_result_fetching: true,
            supports_worker_stats: true,
            supports_priorities: false,
            durable: false,
        }
    }

    pub fn redis() -> Self {
        Self { durable: true, ..Self::memory() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub queues: Vec<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_heartbeat: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub pending_count: usize,
}
