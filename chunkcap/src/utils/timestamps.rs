//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Formats `time` as ISO 8601 with microseconds and an explicit UTC offset.
#[must_use]
pub fn format_iso(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC time as an ISO 8601 string.
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso(&now_utc())
}
