// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsing of operator-entered timestamps into canonical UTC instants.
//!
//! Accepted forms, tried in order:
//!
//! 1. ISO-8601 / RFC3339 with offset — `2025-01-15T10:00:00+01:00`
//! 2. `YYYY-MM-DD HH:MM:SS` — interpreted in the configured default zone
//! 3. `MM/DD/YYYY h:mm AM/PM` — US order only
//! 4. `January 15, 2025 at 10:00 AM`
//! 5. `YYYY-MM-DD` — midnight in the configured default zone
//!
//! European `DD/MM/YYYY` inputs fail the month check of form 3 and are
//! reported as [`DateTimeError::InvalidFormat`]; they are never silently
//! reinterpreted.

use crate::{DateTimeConfig, DateTimeError};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Naive-with-default-zone formats tried after RFC3339.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y at %I:%M %p",
];

/// Time-only formats combined with a base date.
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%I:%M:%S %p", "%H:%M:%S", "%H:%M"];

/// Parse an IANA zone name.
///
/// # Errors
///
/// Returns [`DateTimeError::InvalidTimezone`] when the name is not in the
/// tz database.
pub fn parse_timezone(name: &str) -> Result<Tz, DateTimeError> {
    name.parse::<Tz>()
        .map_err(|_| DateTimeError::InvalidTimezone {
            zone: name.to_string(),
        })
}

/// Parse a timestamp in any accepted presentation format.
///
/// Inputs without an explicit offset are interpreted in
/// `config.default_timezone`.
///
/// # Errors
///
/// Returns [`DateTimeError::InvalidFormat`] when no accepted form matches,
/// and [`DateTimeError::InvalidTimezone`] when the local time does not
/// exist in the default zone (DST gap).
pub fn parse_timestamp(
    input: &str,
    config: &DateTimeConfig,
) -> Result<DateTime<Utc>, DateTimeError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return resolve_local(naive, config.default_timezone);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| invalid(trimmed))?;
        return resolve_local(midnight, config.default_timezone);
    }

    Err(invalid(trimmed))
}

/// Parse a time-only input against a base date.
///
/// Both 12-hour (`2:30 PM`) and 24-hour (`14:30`, `14:30:00`) forms are
/// accepted; the result is interpreted in `config.default_timezone`.
///
/// # Errors
///
/// Returns [`DateTimeError::InvalidFormat`] when no time form matches.
pub fn parse_time_with_base(
    input: &str,
    base: NaiveDate,
    config: &DateTimeConfig,
) -> Result<DateTime<Utc>, DateTimeError> {
    let trimmed = input.trim();
    for fmt in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(trimmed, fmt) {
            return resolve_local(base.and_time(time), config.default_timezone);
        }
    }
    Err(invalid(trimmed))
}

fn invalid(input: &str) -> DateTimeError {
    DateTimeError::InvalidFormat {
        input: input.to_string(),
    }
}

/// Resolve a naive local time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; nonexistent
/// times (DST gap) are rejected.
fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, DateTimeError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(DateTimeError::InvalidTimezone {
            zone: tz.name().to_string(),
        }),
    }
}
