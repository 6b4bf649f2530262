// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation of meeting and schedule windows.

use crate::{DateTimeConfig, DateTimeError, format_rfc3339};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Bounds applied to meeting and schedule windows.
///
/// The defaults encode operational policy: meetings run between fifteen
/// minutes and eight hours, change windows fit inside a day, and nothing
/// is planned more than two years out.
#[derive(Debug, Clone)]
pub struct ScheduleRules {
    /// Furthest a start may lie in the future.
    pub max_future: Duration,
    /// Shortest acceptable meeting.
    pub min_meeting: Duration,
    /// Longest acceptable meeting.
    pub max_meeting: Duration,
    /// Longest acceptable schedule window.
    pub max_window: Duration,
    /// When set, starts must fall Mon–Fri 08:00–18:00 in this zone.
    pub business_hours: Option<Tz>,
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self {
            max_future: Duration::days(730),
            min_meeting: Duration::minutes(15),
            max_meeting: Duration::hours(8),
            max_window: Duration::hours(24),
            business_hours: None,
        }
    }
}

/// Validate a meeting window against `now`.
///
/// # Errors
///
/// - [`DateTimeError::InvalidRange`] — end not after start, or duration
///   outside `[min_meeting, max_meeting]`.
/// - [`DateTimeError::PastDate`] — start earlier than `now` minus the
///   configured tolerance (skipped when `allow_past_dates` is set).
/// - [`DateTimeError::FutureDate`] — start beyond `max_future`.
pub fn validate_meeting_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &DateTimeConfig,
    rules: &ScheduleRules,
) -> Result<(), DateTimeError> {
    check_ordering(start, end)?;
    check_horizon(start, now, config, rules)?;

    let duration = end - start;
    if duration < rules.min_meeting {
        return Err(DateTimeError::InvalidRange {
            reason: format!(
                "meeting shorter than {} minutes",
                rules.min_meeting.num_minutes()
            ),
        });
    }
    if duration > rules.max_meeting {
        return Err(DateTimeError::InvalidRange {
            reason: format!("meeting longer than {} hours", rules.max_meeting.num_hours()),
        });
    }

    if let Some(zone) = rules.business_hours {
        check_business_hours(start, zone)?;
    }
    Ok(())
}

/// Validate a change-schedule window against `now`.
///
/// # Errors
///
/// Same taxonomy as [`validate_meeting_window`], with the duration bound
/// replaced by the `max_window` ceiling.
pub fn validate_schedule_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &DateTimeConfig,
    rules: &ScheduleRules,
) -> Result<(), DateTimeError> {
    check_ordering(start, end)?;
    check_horizon(start, now, config, rules)?;

    if end - start > rules.max_window {
        return Err(DateTimeError::InvalidRange {
            reason: format!(
                "schedule window longer than {} hours",
                rules.max_window.num_hours()
            ),
        });
    }
    Ok(())
}

fn check_ordering(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DateTimeError> {
    if end <= start {
        return Err(DateTimeError::InvalidRange {
            reason: "end is not after start".to_string(),
        });
    }
    Ok(())
}

fn check_horizon(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &DateTimeConfig,
    rules: &ScheduleRules,
) -> Result<(), DateTimeError> {
    if !config.allow_past_dates && start < now - config.future_tolerance {
        return Err(DateTimeError::PastDate {
            timestamp: format_rfc3339(start),
        });
    }
    if start > now + rules.max_future {
        return Err(DateTimeError::FutureDate {
            timestamp: format_rfc3339(start),
        });
    }
    Ok(())
}

fn check_business_hours(start: DateTime<Utc>, zone: Tz) -> Result<(), DateTimeError> {
    let local = start.with_timezone(&zone);
    let weekday_ok = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
    let hour_ok = (8..18).contains(&local.hour());
    if !(weekday_ok && hour_ok) {
        return Err(DateTimeError::InvalidRange {
            reason: format!(
                "start {} is outside business hours in {}",
                local.format("%A %H:%M"),
                zone.name()
            ),
        });
    }
    Ok(())
}
