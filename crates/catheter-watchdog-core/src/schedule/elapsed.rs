//! Elapsed-time calculator.

use chrono::{DateTime, FixedOffset, Utc};

use super::{ScheduleError, ScheduleResult};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Parse a timezone-aware ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`Z` or `+hh:mm`) and the compact `+hhmm` offset form.
/// Timestamps without an offset are rejected.
pub fn parse_insertion_time(raw: &str) -> ScheduleResult<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map_err(|_| ScheduleError::MalformedTimestamp(raw.to_string()))
}

/// Hours elapsed between `inserted_at` and `now`.
///
/// Negative when the insertion time lies in the future; that is passed
/// through unchanged.
pub fn hours_since_insertion(inserted_at: &str, now: DateTime<Utc>) -> ScheduleResult<f64> {
    let inserted = parse_insertion_time(inserted_at)?;
    let delta = now.signed_duration_since(inserted.with_timezone(&Utc));
    Ok(delta.num_milliseconds() as f64 / MILLIS_PER_HOUR)
}
