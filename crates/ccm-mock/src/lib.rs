// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mock collaborators used for local testing.
//!
//! Everything here is deterministic and in-memory: an email gateway
//! with per-customer topic subscriber lists and a sent-mail log, a
//! meeting provider with real idempotency-key semantics, a queue that
//! redelivers unacknowledged messages, and record fixtures.

#![deny(unsafe_code)]

use async_trait::async_trait;
use ccm_core::{
    Announcement, AnnouncementType, Change, ModificationEntry, ModificationType, ObjectType,
    RecordId, Schedule, Status,
};
use ccm_email::{EmailError, EmailGateway, Topic};
use ccm_error::Fault;
use ccm_meeting::{MeetingError, MeetingProvider, MeetingRequest, ProvisionedMeeting};
use ccm_processor::{QueueMessage, QueueSource, TriggerEvent};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Email gateway
// ---------------------------------------------------------------------------

/// One message captured by [`MockEmailGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Customer whose service sent it.
    pub customer_code: String,
    /// Topic it went to.
    pub topic: Topic,
    /// Final recipient list.
    pub recipients: Vec<String>,
    /// Rendered subject.
    pub subject: String,
    /// Rendered body.
    pub html_body: String,
}

/// In-memory email gateway with per-customer topic subscriber lists.
#[derive(Debug, Default)]
pub struct MockEmailGateway {
    subscribers: Mutex<HashMap<(String, &'static str), Vec<String>>>,
    sent: Mutex<Vec<SentEmail>>,
    failing_customers: Mutex<BTreeSet<String>>,
}

impl MockEmailGateway {
    /// An empty gateway; every topic starts with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic's subscribers for a customer.
    pub fn set_subscribers(&self, customer_code: &str, topic: Topic, subscribers: &[&str]) {
        self.subscribers.lock().unwrap().insert(
            (customer_code.to_string(), topic.name()),
            subscribers.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Make every call for this customer fail with a transient error.
    pub fn fail_customer(&self, customer_code: &str) {
        self.failing_customers
            .lock()
            .unwrap()
            .insert(customer_code.to_string());
    }

    /// Stop failing the customer.
    pub fn heal_customer(&self, customer_code: &str) {
        self.failing_customers.lock().unwrap().remove(customer_code);
    }

    /// Everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages sent to one topic.
    #[must_use]
    pub fn sent_to(&self, topic: Topic) -> Vec<SentEmail> {
        self.sent()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    fn check_customer(&self, customer_code: &str) -> Result<(), EmailError> {
        if self
            .failing_customers
            .lock()
            .unwrap()
            .contains(customer_code)
        {
            return Err(EmailError::Transient {
                customer_code: customer_code.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmailGateway for MockEmailGateway {
    async fn list_subscribers(
        &self,
        customer_code: &str,
        topic: Topic,
    ) -> Result<Vec<String>, EmailError> {
        self.check_customer(customer_code)?;
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .get(&(customer_code.to_string(), topic.name()))
            .cloned()
            .unwrap_or_default())
    }

    async fn send(
        &self,
        customer_code: &str,
        topic: Topic,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        self.check_customer(customer_code)?;
        self.sent.lock().unwrap().push(SentEmail {
            customer_code: customer_code.to_string(),
            topic,
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Meeting provider
// ---------------------------------------------------------------------------

/// In-memory meeting provider honoring idempotency keys.
///
/// A create with a known key returns the existing meeting; cancelling
/// removes the meeting and frees the key, as the real provider does.
#[derive(Debug, Default)]
pub struct MockMeetingProvider {
    meetings: Mutex<HashMap<String, ProvisionedMeeting>>,
    creates: Mutex<Vec<MeetingRequest>>,
    cancels: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
    fail_creates: Mutex<bool>,
}

impl MockMeetingProvider {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make create calls fail until healed.
    pub fn fail_creates(&self, fail: bool) {
        *self.fail_creates.lock().unwrap() = fail;
    }

    /// Every create request seen, in order.
    #[must_use]
    pub fn creates(&self) -> Vec<MeetingRequest> {
        self.creates.lock().unwrap().clone()
    }

    /// Every cancelled meeting id, in order.
    #[must_use]
    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }

    /// Meetings currently live.
    #[must_use]
    pub fn live_meetings(&self) -> Vec<ProvisionedMeeting> {
        self.meetings.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl MeetingProvider for MockMeetingProvider {
    async fn create(&self, request: &MeetingRequest) -> Result<ProvisionedMeeting, MeetingError> {
        if *self.fail_creates.lock().unwrap() {
            return Err(MeetingError::Unavailable {
                reason: "scripted failure".to_string(),
            });
        }
        self.creates.lock().unwrap().push(request.clone());
        let mut meetings = self.meetings.lock().unwrap();
        let entry = meetings
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                ProvisionedMeeting {
                    meeting_id: format!("M{next}", next = *next),
                    join_url: format!("https://meet.example/m{next}", next = *next),
                }
            });
        Ok(entry.clone())
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError> {
        let mut meetings = self.meetings.lock().unwrap();
        let before = meetings.len();
        meetings.retain(|_, m| m.meeting_id != meeting_id);
        if meetings.len() == before {
            return Err(MeetingError::NotFound {
                meeting_id: meeting_id.to_string(),
            });
        }
        self.cancels.lock().unwrap().push(meeting_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// In-memory queue with redelivery of unacknowledged messages.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    next_id: Mutex<u64>,
}

impl MemoryQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a trigger event.
    pub fn push(&self, event: TriggerEvent) {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.pending.lock().unwrap().push_back(QueueMessage {
            id: format!("msg-{next}", next = *next),
            event,
        });
    }

    /// Messages still in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Whether everything has been acknowledged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl QueueSource for MemoryQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, Fault> {
        // Unacknowledged messages stay at the front and come back on the
        // next receive, mimicking visibility-timeout redelivery.
        let pending = self.pending.lock().unwrap();
        Ok(pending.iter().take(max).cloned().collect())
    }

    async fn acknowledge(&self, message_id: &str) -> Result<(), Fault> {
        self.pending
            .lock()
            .unwrap()
            .retain(|m| m.id != message_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A fixed creation instant shared by the fixtures.
#[must_use]
pub fn fixture_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
}

/// A submitted change affecting `hts` and `cds`, meeting required.
#[must_use]
pub fn submitted_change() -> Change {
    let t0 = fixture_instant();
    Change {
        change_id: RecordId::parse("CHANGE-2025-001").unwrap(),
        object_type: ObjectType::Change,
        title: "Rotate edge certificates".to_string(),
        description: "Annual certificate rotation across the fleet".to_string(),
        implementation_plan: "Rotate region by region with health checks".to_string(),
        schedule: Schedule {
            start_time: Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
            timezone: "Europe/Berlin".to_string(),
        },
        affected_customers: ["hts".to_string(), "cds".to_string()].into(),
        status: Status::Submitted,
        created_by: "operator@example.org".to_string(),
        created_at: t0,
        meeting_required: true,
        meeting_id: None,
        join_url: None,
        modifications: vec![
            ModificationEntry::new(ModificationType::Created, "operator@example.org", t0),
            ModificationEntry::new(
                ModificationType::Submitted,
                "operator@example.org",
                t0 + chrono::Duration::minutes(5),
            ),
        ],
    }
}

/// [`submitted_change`] moved to `approved`.
#[must_use]
pub fn approved_change() -> Change {
    let mut change = submitted_change();
    change.status = Status::Approved;
    change.modifications.push(ModificationEntry::new(
        ModificationType::Approved,
        "approver@example.org",
        fixture_instant() + chrono::Duration::minutes(30),
    ));
    change
}

/// A submitted FinOps announcement for `hts`.
#[must_use]
pub fn submitted_announcement() -> Announcement {
    let t0 = fixture_instant();
    Announcement {
        announcement_id: RecordId::parse("FIN-2025-001").unwrap(),
        object_type: ObjectType::AnnouncementFinops,
        announcement_type: AnnouncementType::Finops,
        title: "Savings plan renewal".to_string(),
        summary: "The renewal window opens next month".to_string(),
        content: "<p>Review your commitments before the window closes.</p>".to_string(),
        customers: ["hts".to_string()].into(),
        status: Status::Submitted,
        include_meeting: false,
        meeting_id: None,
        join_url: None,
        attachments: vec![],
        created_by: "operator@example.org".to_string(),
        created_at: t0,
        modifications: vec![
            ModificationEntry::new(ModificationType::Created, "operator@example.org", t0),
            ModificationEntry::new(
                ModificationType::Submitted,
                "operator@example.org",
                t0 + chrono::Duration::minutes(5),
            ),
        ],
    }
}

/// A two-customer configuration matching the fixtures.
#[must_use]
pub fn fixture_config() -> ccm_config::AppConfig {
    ccm_config::AppConfig::from_toml_str(
        r#"
        bucket = "contact-manager-test"
        processor_principal = "arn:aws:sts::111111111111:assumed-role/ccm-processor"

        [meeting_provider]
        base_url = "https://graph.example.com/v1"
        organizer = "ccoe@example.org"

        [[customers]]
        customer_code = "hts"
        display_name = "HTS Corp"
        region = "eu-central-1"
        email_role_principal = "arn:aws:iam::222222222222:role/ccm-email"
        queue_identifier = "ccm-hts-events"

        [[customers]]
        customer_code = "cds"
        display_name = "CDS GmbH"
        region = "eu-west-1"
        email_role_principal = "arn:aws:iam::333333333333:role/ccm-email"
        queue_identifier = "ccm-cds-events"
        "#,
    )
    .expect("fixture config is valid")
}

/// The trigger event the front-end's fan-out would emit.
#[must_use]
pub fn trigger_event(customer_code: &str, record_id: &str) -> TriggerEvent {
    TriggerEvent {
        bucket: "contact-manager-test".to_string(),
        key: format!("customers/{customer_code}/{record_id}"),
        source_principal: "arn:aws:sts::111111111111:assumed-role/ccm-frontend".to_string(),
    }
}
