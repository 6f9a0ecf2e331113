//! The job queue: durable and in-memory backends behind one
//! `JobQueueManager` algorithm, plus schedules, worker supervision, and a
//! backend registry callers select by name.

mod backend;
mod error;
mod manager;
mod registry;
mod store;
mod types;
mod wire;

pub use backend::{JobQueueBackend, MemoryBackend, RedisBackend};
pub use error::QueueError;
pub use manager::{
    AddJobParams, AddScheduleParams, JobFn, JobFunctionRegistry, JobQueueManager, JobQueueManagerImpl,
    ScheduleResultIndex,
};
pub use registry::{BackendFactory, BackendRegistry};
pub use store::{MemoryStore, RedisStore, Store};
pub use types::{
    BackendCapabilities, ConflictPolicy, Job, JobStatus, MisfirePolicy, QueueInfo, RepeatSpec, RetrySpec, Schedule,
    ScheduleStatus, ScheduleTrigger, WorkerInfo, WorkerStats,
};
pub use wire::{decode, encode, WireEnvelope, INLINE_RESULT_LIMIT_BYTES, WIRE_VERSION};
