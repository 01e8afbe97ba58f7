//! Parsing of human-readable schedule times
//!
//! Used by `page-queue` for `--schedule` and `reschedule`. Supported forms:
//! - `now`
//! - Relative durations: "1h", "30m", "2d", "1 hour"
//! - Natural language and absolute times: "tomorrow", "2025-11-20 15:00", "next monday 10am"
//! - RFC 3339 timestamps: "2025-11-20T15:00:00Z"
//! - Unix timestamps in seconds: "1763650800"
//!
//! Times in the past are accepted; such a post is due on the next run.

use chrono::{DateTime, Duration, Utc};

use crate::{PagecastError, Result};

/// Parse a schedule string relative to the current time.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    parse_schedule_at(input, Utc::now())
}

/// Parse a schedule string relative to `now`.
///
/// # Errors
///
/// Returns `PagecastError::InvalidInput` if the string is empty or matches
/// none of the supported forms.
pub fn parse_schedule_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PagecastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Ok(timestamp) = input.parse::<i64>() {
        return DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
            PagecastError::InvalidInput(format!("Timestamp out of range: {}", timestamp))
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(now + duration);
    }

    if let Ok(dt) = parse_natural_language(input, now) {
        return Ok(dt);
    }

    Err(PagecastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input).map_err(|e| {
        PagecastError::InvalidInput(format!("Could not parse duration '{}': {}", input, e))
    })?;

    i64::try_from(std_duration.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| PagecastError::InvalidInput("Duration out of range".to_string()))
}

fn parse_natural_language(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|e| PagecastError::InvalidInput(format!("Could not parse time: {}", e)))
}
