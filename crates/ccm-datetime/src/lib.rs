// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-datetime
//!
//! All time handling for the contact manager lives here: parsing the
//! presentation formats operators type, formatting instants for the wire
//! and for humans, and validating meeting and schedule windows.
//!
//! The canonical internal form is [`chrono::DateTime<Utc>`]; IANA zones
//! ([`chrono_tz::Tz`]) are carried separately for display. No other crate
//! assembles date/time strings by hand.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Formatting of canonical instants for the wire, the provider, ICS, and humans.
pub mod format;
/// Parsing of the accepted presentation formats into canonical instants.
pub mod parse;
/// Validation of meeting starts, durations, and schedule windows.
pub mod validate;

use chrono::Duration;
use chrono_tz::Tz;
use thiserror::Error;

pub use format::{format_human, format_ics, format_provider, format_rfc3339};
pub use parse::{parse_time_with_base, parse_timestamp, parse_timezone};
pub use validate::{ScheduleRules, validate_meeting_window, validate_schedule_window};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Tagged errors produced by parsing, formatting, and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateTimeError {
    /// The input matched none of the accepted presentation formats.
    #[error("unrecognised timestamp format: {input:?}")]
    InvalidFormat {
        /// The rejected input, verbatim.
        input: String,
    },

    /// The zone name is not a valid IANA identifier, or the local time does
    /// not exist in the zone (DST gap).
    #[error("invalid timezone: {zone}")]
    InvalidTimezone {
        /// The offending zone name.
        zone: String,
    },

    /// A window or duration constraint was violated.
    #[error("invalid range: {reason}")]
    InvalidRange {
        /// What was out of range.
        reason: String,
    },

    /// The timestamp lies before `now` minus the configured tolerance.
    #[error("timestamp is in the past: {timestamp}")]
    PastDate {
        /// RFC3339 rendering of the rejected instant.
        timestamp: String,
    },

    /// The timestamp lies more than the allowed horizon in the future.
    #[error("timestamp is too far in the future: {timestamp}")]
    FutureDate {
        /// RFC3339 rendering of the rejected instant.
        timestamp: String,
    },
}

impl DateTimeError {
    /// Stable tag for logs and structured error reporting.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::InvalidTimezone { .. } => "INVALID_TIMEZONE",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::PastDate { .. } => "PAST_DATE",
            Self::FutureDate { .. } => "FUTURE_DATE",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Process-wide datetime defaults, constructed once from configuration.
#[derive(Debug, Clone)]
pub struct DateTimeConfig {
    /// Zone assumed for inputs that carry no offset of their own.
    pub default_timezone: Tz,
    /// When `true`, validation skips the past-date check entirely.
    pub allow_past_dates: bool,
    /// Slack subtracted from `now` before a start is declared in the past.
    pub future_tolerance: Duration,
}

impl Default for DateTimeConfig {
    fn default() -> Self {
        Self {
            default_timezone: chrono_tz::UTC,
            allow_past_dates: false,
            future_tolerance: Duration::minutes(5),
        }
    }
}
