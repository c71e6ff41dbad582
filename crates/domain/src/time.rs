//! Time and timestamp helpers.
//!
//! The engine never reads the wall clock: every operation receives its
//! timestamp explicitly. [`now`] exists for the outer layers only.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for sensor events, motion, deactivations and warnings.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Elapsed seconds from `earlier` to `later`, with millisecond precision.
///
/// Negative when `later` precedes `earlier`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn seconds_between(later: Timestamp, earlier: Timestamp) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Build a [`TimeDelta`] from a whole number of seconds, saturating on overflow.
#[must_use]
pub fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
