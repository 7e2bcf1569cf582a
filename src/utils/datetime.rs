//! Date and time utility functions
//!
//! The task API exchanges instants as epoch milliseconds; the rest of the
//! crate works with `DateTime<Utc>`. These helpers convert between the two and
//! implement the small pieces of calendar arithmetic tasks need.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Format used when instants are written to logs
pub const LOG_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert epoch milliseconds to a UTC instant
///
/// # Returns
/// * `None` if the value is outside the range chrono can represent
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Convert a UTC instant to epoch milliseconds
pub fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Midnight (UTC) of the date the instant falls on
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// The instant `minutes` minutes before `instant`
///
/// Negative offsets move forward in time.
///
/// # Returns
/// * `None` if the result is outside the range chrono can represent
pub fn minutes_before(instant: DateTime<Utc>, minutes: i32) -> Option<DateTime<Utc>> {
    instant.checked_sub_signed(Duration::minutes(i64::from(minutes)))
}

/// Human-readable rendering of an instant for log lines
pub fn format_for_log(instant: DateTime<Utc>) -> String {
    instant.format(LOG_DATETIME_FORMAT).to_string()
}
