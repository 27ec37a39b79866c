//! Daily streak and day-bucket date logic.
//!
//! Days are UTC `YYYY-MM-DD` strings, stored alongside millisecond
//! timestamps for cheap grouping in analytics queries.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Day bucket string for a Unix timestamp in milliseconds.
pub fn day_bucket(timestamp_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    format!("{:04}-{:02}-{:02}", dt.year(), dt.month(), dt.day())
}

/// Today's day bucket.
pub fn current_day_bucket() -> String {
    day_bucket(Utc::now().timestamp_millis())
}

/// Outcome of a streak update for one activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakStep {
    /// Today was already counted; the stored value stands.
    AlreadyCounted,
    /// First activity of the day; store this new streak value.
    Advance(i64),
}

/// Compute the next streak value for an activity happening today.
///
/// Consecutive-day activity extends the streak; a gap resets it to 1;
/// repeated activity within one day is counted once.
pub fn step_streak(last_play_date: Option<&str>, current: i64) -> StreakStep {
    let today = Utc::now().date_naive();

    let Some(last) = last_play_date else {
        return StreakStep::Advance(1);
    };
    let Ok(last_date) = NaiveDate::parse_from_str(last, "%Y-%m-%d") else {
        return StreakStep::Advance(1);
    };

    let days_since = (today - last_date).num_days();
    match days_since {
        0 => StreakStep::AlreadyCounted,
        1 => StreakStep::Advance(current + 1),
        _ => StreakStep::Advance(1),
    }
}
