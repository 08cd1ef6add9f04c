//! Daily rollup bucketing.
//!
//! A day bucket is the UTC calendar day containing a timestamp, computed by
//! integer division so it never depends on the local timezone or wall clock.

use crate::error::{Error, Result};
use chrono::DateTime;

/// Seconds in a UTC day (leap seconds are not represented in Unix time).
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Start of the day containing `timestamp`, in Unix seconds.
pub fn day_start(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY * SECONDS_PER_DAY
}

/// ISO calendar date (`YYYY-MM-DD`) of the day containing `timestamp`.
///
/// This is the key of the `DailyStats` record the event accumulates into.
pub fn day_key(timestamp: u64) -> Result<String> {
    let start =
        i64::try_from(day_start(timestamp)).map_err(|_| Error::TimestampOutOfRange(timestamp))?;
    DateTime::from_timestamp(start, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .ok_or(Error::TimestampOutOfRange(timestamp))
}
