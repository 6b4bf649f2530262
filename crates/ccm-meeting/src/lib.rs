// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-meeting
//!
//! Cross-customer meeting scheduling.
//!
//! One record gets at most one meeting, whichever customer's fan-out
//! reaches the provider first: the idempotency key is derived from the
//! record id alone. Attendee gathering fans out one task per customer
//! and tolerates individual failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// HTTP client for the remote meeting provider.
pub mod http;
/// The meeting service: gathering, dedup, provider calls.
pub mod service;

pub use http::HttpMeetingProvider;
pub use service::{AttendeeGathering, MeetingOutcome, MeetingService, meeting_window};

use async_trait::async_trait;
use ccm_error::{Fault, FaultKind};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Provider contract
// ---------------------------------------------------------------------------

/// What the provider needs to create a meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    /// Meeting subject line.
    pub subject: String,
    /// Start instant.
    pub start_time: DateTime<Utc>,
    /// End instant.
    pub end_time: DateTime<Utc>,
    /// Organizer email.
    pub organizer: String,
    /// Deduplicated attendee emails.
    pub attendees: BTreeSet<String>,
    /// Record-derived idempotency key; repeated calls with the same key
    /// yield the same meeting.
    pub idempotency_key: String,
}

/// What the provider hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedMeeting {
    /// Opaque provider identifier.
    pub meeting_id: String,
    /// Absolute join URL.
    pub join_url: String,
}

/// Failures from the remote provider.
#[derive(Debug, Error)]
pub enum MeetingError {
    /// The meeting does not exist (already cancelled, or never created).
    #[error("meeting not found: {meeting_id}")]
    NotFound {
        /// The missing meeting.
        meeting_id: String,
    },

    /// The provider rejected the request.
    #[error("meeting provider rejected the call: {reason}")]
    Rejected {
        /// Provider-reported reason.
        reason: String,
    },

    /// The provider could not be reached or returned a 5xx.
    #[error("meeting provider unavailable: {reason}")]
    Unavailable {
        /// What went wrong.
        reason: String,
    },
}

impl From<MeetingError> for Fault {
    fn from(err: MeetingError) -> Self {
        let kind = match &err {
            MeetingError::NotFound { .. } | MeetingError::Rejected { .. } => FaultKind::Provider,
            MeetingError::Unavailable { .. } => FaultKind::Provider,
        };
        Fault::new(kind, err.to_string()).with_source(err)
    }
}

/// The remote meeting provider, as a minimal remote procedure.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Create (or return the existing) meeting for the request's
    /// idempotency key.
    async fn create(&self, request: &MeetingRequest) -> Result<ProvisionedMeeting, MeetingError>;

    /// Cancel a meeting.
    async fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError>;
}

#[async_trait]
impl<P: MeetingProvider + ?Sized> MeetingProvider for std::sync::Arc<P> {
    async fn create(&self, request: &MeetingRequest) -> Result<ProvisionedMeeting, MeetingError> {
        (**self).create(request).await
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError> {
        (**self).cancel(meeting_id).await
    }
}

/// Idempotency key for a record's meeting: hex SHA-256 of the record id.
#[must_use]
pub fn idempotency_key(record_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_and_hex() {
        let a = idempotency_key("CHANGE-2025-001");
        let b = idempotency_key("CHANGE-2025-001");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, idempotency_key("CHANGE-2025-002"));
    }
}
