//! Shared types and ambient-stack helpers used across the flowerpower
//! workspace: error classification, the `FP_*` environment overlay, the
//! process-wide callback registry, identifiers and time helpers.

pub mod callback;
pub mod env_overlay;
pub mod error_kind;
pub mod ids;
pub mod time;

pub use callback::{CallbackFn, CallbackPayload, CallbackRegistry, DEFAULT_CALLBACKS};
pub use error_kind::{Classify, ErrorKind};
pub use ids::{JobId, RunId, ScheduleId, TokenId};
