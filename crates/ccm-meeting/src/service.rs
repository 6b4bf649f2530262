// SPDX-License-Identifier: MIT OR Apache-2.0
//! The meeting service: attendee gathering, dedup, provider calls.

use crate::{MeetingError, MeetingProvider, MeetingRequest, idempotency_key};
use ccm_config::AppConfig;
use ccm_core::{MeetingMetadata, Record};
use ccm_email::{EmailGateway, Topic, apply_allow_list, normalize_email};
use ccm_error::Fault;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of fanning out subscriber fetches across customers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttendeeGathering {
    /// Deduplicated, normalized attendee emails.
    pub attendees: BTreeSet<String>,
    /// Sum of per-customer subscriber counts, before filtering and dedup.
    pub total_attendees: u64,
    /// Customers whose fetch failed and was skipped.
    pub fetch_errors: u64,
}

/// A scheduled meeting plus the gathering counters that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingOutcome {
    /// Metadata to persist on the record.
    pub metadata: MeetingMetadata,
    /// Gathering counters for the execution summary.
    pub gathering: AttendeeGathering,
}

/// The meeting window derived from a record.
///
/// Changes meet during their schedule window, capped at eight hours.
/// Announcements carry no schedule; their walkthrough slot is three days
/// after creation, for one hour.
#[must_use]
pub fn meeting_window(record: &Record) -> (DateTime<Utc>, DateTime<Utc>) {
    match record {
        Record::Change(change) => {
            let start = change.schedule.start_time;
            let end = change
                .schedule
                .end_time
                .min(start + Duration::hours(8));
            (start, end)
        }
        Record::Announcement(announcement) => {
            let start = announcement.created_at + Duration::hours(72);
            (start, start + Duration::hours(1))
        }
    }
}

/// Aggregates attendees across customers and talks to the provider.
pub struct MeetingService<G, P> {
    gateway: G,
    provider: P,
    config: Arc<AppConfig>,
}

impl<G: EmailGateway, P: MeetingProvider> MeetingService<G, P> {
    /// Service over the given gateway and provider.
    #[must_use]
    pub fn new(gateway: G, provider: P, config: Arc<AppConfig>) -> Self {
        Self {
            gateway,
            provider,
            config,
        }
    }

    /// Fetch each customer's calendar subscribers concurrently.
    ///
    /// Fetches are independent: a failing customer is logged and counted,
    /// never fatal. Each customer's allow-list applies only to the
    /// recipients it sourced; a recipient is in the union if any sourcing
    /// customer admits them.
    pub async fn gather_attendees(&self, customer_codes: &[String]) -> AttendeeGathering {
        let fetches = customer_codes.iter().map(|code| async move {
            (
                code.as_str(),
                self.gateway.list_subscribers(code, Topic::Calendar).await,
            )
        });

        let mut gathering = AttendeeGathering::default();
        for (code, result) in join_all(fetches).await {
            match result {
                Ok(subscribers) => {
                    gathering.total_attendees += subscribers.len() as u64;
                    let allow_list = self
                        .config
                        .customer(code)
                        .and_then(|c| c.restricted_recipients.as_deref());
                    let filtered = apply_allow_list(subscribers, allow_list);
                    gathering
                        .attendees
                        .extend(filtered.recipients.iter().map(|r| normalize_email(r)));
                }
                Err(err) => {
                    warn!(
                        customer_code = code,
                        error = %err,
                        "calendar subscriber fetch failed; continuing without this customer"
                    );
                    gathering.fetch_errors += 1;
                }
            }
        }
        gathering
    }

    /// Create the record's meeting (or return the existing one).
    ///
    /// The idempotency key derives from the record id, so concurrent
    /// per-customer invocations converge on a single meeting.
    ///
    /// # Errors
    ///
    /// Returns a provider fault when the create call fails.
    pub async fn create_meeting(
        &self,
        record: &Record,
        customer_codes: &[String],
    ) -> Result<MeetingOutcome, Fault> {
        let gathering = self.gather_attendees(customer_codes).await;
        let (start_time, end_time) = meeting_window(record);
        let request = MeetingRequest {
            subject: record.title().to_string(),
            start_time,
            end_time,
            organizer: self.config.meeting_provider.organizer.clone(),
            attendees: gathering.attendees.clone(),
            idempotency_key: idempotency_key(record.id().as_str()),
        };

        let provisioned = self.provider.create(&request).await.map_err(Fault::from)?;
        debug!(
            record_id = record.id().as_str(),
            meeting_id = provisioned.meeting_id.as_str(),
            attendees = gathering.attendees.len(),
            "meeting scheduled"
        );

        Ok(MeetingOutcome {
            metadata: MeetingMetadata {
                meeting_id: provisioned.meeting_id,
                join_url: provisioned.join_url,
                start_time,
                end_time,
                organizer: request.organizer,
                attendees: request.attendees,
            },
            gathering,
        })
    }

    /// Cancel a meeting, best-effort.
    ///
    /// Returns `true` when the provider cancelled it now and `false` when
    /// it was already gone; both are success.
    ///
    /// # Errors
    ///
    /// Returns a provider fault for anything but "not found".
    pub async fn cancel_meeting(&self, meeting_id: &str) -> Result<bool, Fault> {
        match self.provider.cancel(meeting_id).await {
            Ok(()) => Ok(true),
            Err(MeetingError::NotFound { .. }) => {
                debug!(meeting_id, "meeting already gone; treating cancel as success");
                Ok(false)
            }
            Err(err) => Err(Fault::from(err)),
        }
    }

    /// Replace a meeting's attendees and times.
    ///
    /// The provider has no update call, so this cancels and recreates
    /// under the same record-derived idempotency key; the archive keeps
    /// the new meeting's identifiers.
    ///
    /// # Errors
    ///
    /// Returns a provider fault when cancellation (other than "not
    /// found") or recreation fails.
    pub async fn update_meeting(
        &self,
        record: &Record,
        customer_codes: &[String],
        meeting_id: &str,
    ) -> Result<MeetingOutcome, Fault> {
        self.cancel_meeting(meeting_id).await?;
        self.create_meeting(record, customer_codes).await
    }
}
