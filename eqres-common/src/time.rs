//! Timestamp utilities
//!
//! Reservation times are persisted as Unix epoch milliseconds (INTEGER
//! columns) so that overlap checks stay plain integer comparisons in SQL.

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a timestamp to epoch milliseconds for storage
pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

/// Convert stored epoch milliseconds back to a UTC timestamp
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    to_millis(now())
}
