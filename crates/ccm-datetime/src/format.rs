// SPDX-License-Identifier: MIT OR Apache-2.0
//! Formatting of canonical instants for every consumer in the system.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

/// Canonical wire rendering: RFC3339 with an explicit offset.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
/// assert_eq!(ccm_datetime::format_rfc3339(t), "2025-01-15T10:00:00+00:00");
/// ```
#[must_use]
pub fn format_rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// The meeting provider's wire form: seven fractional digits, always UTC,
/// no offset designator.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
/// assert_eq!(ccm_datetime::format_provider(t), "2025-01-15T10:00:00.0000000");
/// ```
#[must_use]
pub fn format_provider(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S.0000000").to_string()
}

/// ICS (iCalendar) UTC rendering used in calendar attachments.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
/// assert_eq!(ccm_datetime::format_ics(t), "20250115T100000Z");
/// ```
#[must_use]
pub fn format_ics(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Human-readable rendering in the record's display zone, suffixed with
/// the IANA zone name.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
/// assert_eq!(
///     ccm_datetime::format_human(t, chrono_tz::Europe::Berlin),
///     "January 15, 2025 at 10:00 AM Europe/Berlin",
/// );
/// ```
#[must_use]
pub fn format_human(t: DateTime<Utc>, zone: Tz) -> String {
    let local = t.with_timezone(&zone);
    format!("{} {}", local.format("%B %-d, %Y at %-I:%M %p"), zone.name())
}
