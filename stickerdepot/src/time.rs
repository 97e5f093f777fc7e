//! Time helpers for persisted timestamps.
//!
//! Timestamps are stored as milliseconds since the Unix epoch and exposed
//! as `chrono::DateTime<Utc>`.

use chrono::{DateTime, TimeZone, Utc};

/// Convert a `DateTime` to epoch milliseconds.
pub fn to_millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert epoch milliseconds to a `DateTime`.
///
/// Out of range values clamp to the epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}
