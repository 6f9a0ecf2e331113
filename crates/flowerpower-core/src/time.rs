//! Centralizes "current time" so other crates never call `Utc::now()`
//! directly, keeping timestamp generation mockable from one place.

use chrono::{DateTime, Utc};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Renders a duration the way a log line should: seconds with millisecond
/// precision for anything under a minute, otherwise whole seconds.
pub fn humanize(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.3}s")
    } else {
        let total = duration.as_secs();
        format!("{}m{}s", total / 60, total % 60)
    }
}
