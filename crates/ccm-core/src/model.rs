// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record shapes stored at `archive/{id}` and mirrored into triggers.
//!
//! Object bodies are UTF-8 JSON of these types. The archive copy is the
//! single source of truth; trigger bodies are never read back as state.

use crate::ids::{RecordId, RecordKind};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Wire-level object type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// A change request.
    Change,
    /// Cloud Innovation Center announcement.
    AnnouncementCic,
    /// FinOps announcement.
    AnnouncementFinops,
    /// InnerSource announcement.
    AnnouncementInnersource,
    /// General announcement.
    AnnouncementGeneral,
}

impl ObjectType {
    /// The announcement type this tag corresponds to, if any.
    #[must_use]
    pub fn announcement_type(&self) -> Option<AnnouncementType> {
        match self {
            Self::Change => None,
            Self::AnnouncementCic => Some(AnnouncementType::Cic),
            Self::AnnouncementFinops => Some(AnnouncementType::Finops),
            Self::AnnouncementInnersource => Some(AnnouncementType::Innersource),
            Self::AnnouncementGeneral => Some(AnnouncementType::General),
        }
    }
}

/// Announcement subtype; selects the topic and template at dispatch time.
///
/// The subtype never alters the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementType {
    /// Cloud Innovation Center.
    Cic,
    /// FinOps.
    Finops,
    /// InnerSource.
    Innersource,
    /// General.
    General,
}

impl AnnouncementType {
    /// The matching wire-level object type.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Cic => ObjectType::AnnouncementCic,
            Self::Finops => ObjectType::AnnouncementFinops,
            Self::Innersource => ObjectType::AnnouncementInnersource,
            Self::General => ObjectType::AnnouncementGeneral,
        }
    }
}

/// Workflow status shared by changes and announcements.
///
/// Announcements never reach [`Status::Completed`]; their lifecycle ends
/// at `approved` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Freely editable; not yet announced to anyone.
    Draft,
    /// Waiting for approval.
    Submitted,
    /// Approved; side effects (meeting, notices) have been fanned out.
    Approved,
    /// Withdrawn before completion.
    Cancelled,
    /// Terminal. The record is permanent.
    Completed,
}

// ---------------------------------------------------------------------------
// Modification log entries
// ---------------------------------------------------------------------------

/// Audit entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    /// Record creation; always the first entry.
    Created,
    /// Content update.
    Updated,
    /// Submitted for approval.
    Submitted,
    /// Approved.
    Approved,
    /// Cancelled.
    Cancelled,
    /// Completed.
    Completed,
    /// Deleted (only reachable from draft or cancelled).
    Deleted,
    /// A per-customer fan-out finished; `customer_code` says which one.
    Processed,
    /// A meeting was created; carries [`MeetingMetadata`].
    MeetingScheduled,
    /// The meeting was cancelled.
    MeetingCancelled,
}

/// Metadata of a scheduled meeting, mirrored at the record top level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeetingMetadata {
    /// Opaque provider identifier.
    pub meeting_id: String,
    /// Absolute join URL.
    pub join_url: String,
    /// Meeting start.
    pub start_time: DateTime<Utc>,
    /// Meeting end.
    pub end_time: DateTime<Utc>,
    /// Organizer email.
    pub organizer: String,
    /// Deduplicated attendee emails.
    pub attendees: BTreeSet<String>,
}

/// One append-only audit entry inside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModificationEntry {
    /// UTC, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// User principal or `"system"`; backend mutations record the invoking
    /// role's principal ARN.
    pub actor: String,
    /// What happened.
    pub modification_type: ModificationType,
    /// Which per-customer fan-out did the work (`processed` entries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_code: Option<String>,
    /// Present only on `meeting_scheduled` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_metadata: Option<MeetingMetadata>,
    /// Free-form operator comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ModificationEntry {
    /// A minimal entry with the given type, stamped `timestamp`/`actor`.
    #[must_use]
    pub fn new(
        modification_type: ModificationType,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            actor: actor.into(),
            modification_type,
            customer_code: None,
            meeting_metadata: None,
            comment: None,
        }
    }

    /// Attach the customer code (for `processed` entries).
    #[must_use]
    pub fn with_customer(mut self, code: impl Into<String>) -> Self {
        self.customer_code = Some(code.into());
        self
    }

    /// Attach meeting metadata (for `meeting_scheduled` entries).
    #[must_use]
    pub fn with_meeting(mut self, metadata: MeetingMetadata) -> Self {
        self.meeting_metadata = Some(metadata);
        self
    }

    /// Attach a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The change schedule window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Schedule {
    /// Window start (absolute instant).
    pub start_time: DateTime<Utc>,
    /// Window end (absolute instant).
    pub end_time: DateTime<Utc>,
    /// IANA zone used for display; validated, never used for arithmetic.
    pub timezone: String,
}

/// A change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Change {
    /// Immutable identifier, `CHANGE-YYYY-NNN`.
    pub change_id: RecordId,
    /// Always [`ObjectType::Change`].
    pub object_type: ObjectType,
    /// One-line title.
    pub title: String,
    /// What is changing and why.
    pub description: String,
    /// How the change will be carried out.
    pub implementation_plan: String,
    /// When the change runs.
    pub schedule: Schedule,
    /// Customer codes the change fans out to. Non-empty once submitted.
    pub affected_customers: BTreeSet<String>,
    /// Workflow status.
    pub status: Status,
    /// Principal that created the record.
    pub created_by: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Whether approval schedules a cross-customer meeting.
    #[serde(default)]
    pub meeting_required: bool,
    /// Provider meeting id, set while a meeting exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    /// Join URL, set while a meeting exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    /// Append-only audit log, oldest first.
    pub modifications: Vec<ModificationEntry>,
}

/// Attachment metadata carried by announcements.
///
/// The core never fetches attachment bodies; `store_key` points into the
/// front-end's upload namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    /// Display name.
    pub name: String,
    /// Object key of the uploaded body.
    pub store_key: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload instant.
    pub uploaded_at: DateTime<Utc>,
    /// MIME type.
    pub content_type: String,
}

/// A typed announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Announcement {
    /// Immutable identifier, `{CIC|FIN|INN|GEN}-YYYY-NNN`.
    pub announcement_id: RecordId,
    /// One of the `announcement_*` tags; must agree with `announcement_type`.
    pub object_type: ObjectType,
    /// Subtype; selects topic and template at dispatch time.
    pub announcement_type: AnnouncementType,
    /// One-line title.
    pub title: String,
    /// Short summary, at most 500 characters.
    pub summary: String,
    /// Body, markdown or HTML.
    pub content: String,
    /// Customer codes the announcement fans out to. Non-empty once submitted.
    pub customers: BTreeSet<String>,
    /// Workflow status. Never `completed` for announcements.
    pub status: Status,
    /// Whether approval schedules a cross-customer meeting.
    #[serde(default)]
    pub include_meeting: bool,
    /// Provider meeting id, set while a meeting exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    /// Join URL, set while a meeting exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    /// Attachment metadata.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Principal that created the record.
    pub created_by: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Append-only audit log, oldest first.
    pub modifications: Vec<ModificationEntry>,
}

/// Either record family, as stored on the wire.
///
/// The two shapes are distinguished by their id field (`change_id` vs
/// `announcement_id`), so no outer tag is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Record {
    /// A change request.
    Change(Change),
    /// A typed announcement.
    Announcement(Announcement),
}

impl Record {
    /// The record identifier.
    #[must_use]
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Change(c) => &c.change_id,
            Self::Announcement(a) => &a.announcement_id,
        }
    }

    /// Which family this record belongs to.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Change(_) => RecordKind::Change,
            Self::Announcement(_) => RecordKind::Announcement,
        }
    }

    /// The wire-level object type.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Change(c) => c.object_type,
            Self::Announcement(a) => a.object_type,
        }
    }

    /// Title shared by both families.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Change(c) => &c.title,
            Self::Announcement(a) => &a.title,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow accessor surface
// ---------------------------------------------------------------------------

/// Minimal accessor interface that lets one workflow engine and one
/// modification log serve both record families.
pub trait WorkflowRecord {
    /// The record identifier.
    fn id(&self) -> &RecordId;
    /// Which family this is.
    fn kind(&self) -> RecordKind;
    /// Current workflow status.
    fn status(&self) -> Status;
    /// Overwrite the workflow status.
    fn set_status(&mut self, status: Status);
    /// Whether approval must schedule a meeting.
    fn meeting_required(&self) -> bool;
    /// Provider meeting id, while a meeting exists.
    fn meeting_id(&self) -> Option<&str>;
    /// Set the top-level meeting fields.
    fn set_meeting(&mut self, meeting_id: String, join_url: String);
    /// Clear the top-level meeting fields.
    fn clear_meeting(&mut self);
    /// Customer codes this record fans out to.
    fn customer_codes(&self) -> &BTreeSet<String>;
    /// The audit log, oldest first.
    fn modifications(&self) -> &[ModificationEntry];
    /// Mutable access for the modification log.
    fn modifications_mut(&mut self) -> &mut Vec<ModificationEntry>;
}

impl WorkflowRecord for Change {
    fn id(&self) -> &RecordId {
        &self.change_id
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Change
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn meeting_required(&self) -> bool {
        self.meeting_required || self.meeting_id.is_some()
    }

    fn meeting_id(&self) -> Option<&str> {
        self.meeting_id.as_deref()
    }

    fn set_meeting(&mut self, meeting_id: String, join_url: String) {
        self.meeting_id = Some(meeting_id);
        self.join_url = Some(join_url);
    }

    fn clear_meeting(&mut self) {
        self.meeting_id = None;
        self.join_url = None;
    }

    fn customer_codes(&self) -> &BTreeSet<String> {
        &self.affected_customers
    }

    fn modifications(&self) -> &[ModificationEntry] {
        &self.modifications
    }

    fn modifications_mut(&mut self) -> &mut Vec<ModificationEntry> {
        &mut self.modifications
    }
}

impl WorkflowRecord for Announcement {
    fn id(&self) -> &RecordId {
        &self.announcement_id
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Announcement
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn meeting_required(&self) -> bool {
        self.include_meeting || self.meeting_id.is_some()
    }

    fn meeting_id(&self) -> Option<&str> {
        self.meeting_id.as_deref()
    }

    fn set_meeting(&mut self, meeting_id: String, join_url: String) {
        self.meeting_id = Some(meeting_id);
        self.join_url = Some(join_url);
    }

    fn clear_meeting(&mut self) {
        self.meeting_id = None;
        self.join_url = None;
    }

    fn customer_codes(&self) -> &BTreeSet<String> {
        &self.customers
    }

    fn modifications(&self) -> &[ModificationEntry] {
        &self.modifications
    }

    fn modifications_mut(&mut self) -> &mut Vec<ModificationEntry> {
        &mut self.modifications
    }
}

impl WorkflowRecord for Record {
    fn id(&self) -> &RecordId {
        match self {
            Self::Change(c) => c.id(),
            Self::Announcement(a) => a.id(),
        }
    }

    fn kind(&self) -> RecordKind {
        match self {
            Self::Change(_) => RecordKind::Change,
            Self::Announcement(_) => RecordKind::Announcement,
        }
    }

    fn status(&self) -> Status {
        match self {
            Self::Change(c) => c.status(),
            Self::Announcement(a) => a.status(),
        }
    }

    fn set_status(&mut self, status: Status) {
        match self {
            Self::Change(c) => c.set_status(status),
            Self::Announcement(a) => a.set_status(status),
        }
    }

    fn meeting_required(&self) -> bool {
        match self {
            Self::Change(c) => c.meeting_required(),
            Self::Announcement(a) => a.meeting_required(),
        }
    }

    fn meeting_id(&self) -> Option<&str> {
        match self {
            Self::Change(c) => WorkflowRecord::meeting_id(c),
            Self::Announcement(a) => WorkflowRecord::meeting_id(a),
        }
    }

    fn set_meeting(&mut self, meeting_id: String, join_url: String) {
        match self {
            Self::Change(c) => c.set_meeting(meeting_id, join_url),
            Self::Announcement(a) => a.set_meeting(meeting_id, join_url),
        }
    }

    fn clear_meeting(&mut self) {
        match self {
            Self::Change(c) => c.clear_meeting(),
            Self::Announcement(a) => a.clear_meeting(),
        }
    }

    fn customer_codes(&self) -> &BTreeSet<String> {
        match self {
            Self::Change(c) => c.customer_codes(),
            Self::Announcement(a) => a.customer_codes(),
        }
    }

    fn modifications(&self) -> &[ModificationEntry] {
        match self {
            Self::Change(c) => c.modifications(),
            Self::Announcement(a) => a.modifications(),
        }
    }

    fn modifications_mut(&mut self) -> &mut Vec<ModificationEntry> {
        match self {
            Self::Change(c) => c.modifications_mut(),
            Self::Announcement(a) => a.modifications_mut(),
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode / duplicate
// ---------------------------------------------------------------------------

/// Serialize a record to its wire body.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] (practically unreachable
/// for these shapes).
pub fn encode_record(record: &Record) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(record)
}

/// Parse a wire body into a record.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] when the body is not a
/// valid record of either family.
pub fn decode_record(bytes: &[u8]) -> Result<Record, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Produce a fresh draft copying another record's content.
///
/// Duplication is creation, not a transition: the copy starts in `draft`
/// with a single `created` entry, no meeting fields, and the given new
/// identifier. The source record is untouched.
#[must_use]
pub fn duplicate(record: &Record, new_id: RecordId, actor: &str, now: DateTime<Utc>) -> Record {
    let created = ModificationEntry::new(ModificationType::Created, actor, now);
    match record {
        Record::Change(c) => Record::Change(Change {
            change_id: new_id,
            object_type: ObjectType::Change,
            title: c.title.clone(),
            description: c.description.clone(),
            implementation_plan: c.implementation_plan.clone(),
            schedule: c.schedule.clone(),
            affected_customers: c.affected_customers.clone(),
            status: Status::Draft,
            created_by: actor.to_string(),
            created_at: now,
            meeting_required: c.meeting_required,
            meeting_id: None,
            join_url: None,
            modifications: vec![created],
        }),
        Record::Announcement(a) => Record::Announcement(Announcement {
            announcement_id: new_id,
            object_type: a.object_type,
            announcement_type: a.announcement_type,
            title: a.title.clone(),
            summary: a.summary.clone(),
            content: a.content.clone(),
            customers: a.customers.clone(),
            status: Status::Draft,
            include_meeting: a.include_meeting,
            meeting_id: None,
            join_url: None,
            attachments: a.attachments.clone(),
            created_by: actor.to_string(),
            created_at: now,
            modifications: vec![created],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_change() -> Change {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Change {
            change_id: RecordId::parse("CHANGE-2025-001").unwrap(),
            object_type: ObjectType::Change,
            title: "Rotate edge certificates".to_string(),
            description: "Annual rotation".to_string(),
            implementation_plan: "Staged rollout per region".to_string(),
            schedule: Schedule {
                start_time: Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
                timezone: "Europe/Berlin".to_string(),
            },
            affected_customers: ["hts".to_string(), "cds".to_string()].into(),
            status: Status::Draft,
            created_by: "operator@example.org".to_string(),
            created_at,
            meeting_required: true,
            meeting_id: None,
            join_url: None,
            modifications: vec![ModificationEntry::new(
                ModificationType::Created,
                "operator@example.org",
                created_at,
            )],
        }
    }

    #[test]
    fn record_round_trips_as_untagged_json() {
        let record = Record::Change(sample_change());
        let bytes = encode_record(&record).unwrap();
        let back = decode_record(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn change_meeting_required_is_derived() {
        let mut change = sample_change();
        change.meeting_required = false;
        assert!(!WorkflowRecord::meeting_required(&change));
        change.meeting_id = Some("M1".to_string());
        assert!(WorkflowRecord::meeting_required(&change));
    }

    #[test]
    fn duplicate_resets_lifecycle_state() {
        let mut change = sample_change();
        change.status = Status::Approved;
        change.meeting_id = Some("M1".to_string());
        change.join_url = Some("https://meet.example/m1".to_string());
        let source = Record::Change(change);

        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let copy = duplicate(
            &source,
            RecordId::parse("CHANGE-2025-002").unwrap(),
            "operator@example.org",
            now,
        );

        let Record::Change(copy) = copy else {
            panic!("expected change");
        };
        assert_eq!(copy.status, Status::Draft);
        assert_eq!(copy.meeting_id, None);
        assert_eq!(copy.join_url, None);
        assert_eq!(copy.modifications.len(), 1);
        assert_eq!(
            copy.modifications[0].modification_type,
            ModificationType::Created
        );
        assert_eq!(copy.title, source.title());
    }

    #[test]
    fn object_type_tags_agree_with_announcement_types() {
        for ty in [
            AnnouncementType::Cic,
            AnnouncementType::Finops,
            AnnouncementType::Innersource,
            AnnouncementType::General,
        ] {
            assert_eq!(ty.object_type().announcement_type(), Some(ty));
        }
        assert_eq!(ObjectType::Change.announcement_type(), None);
    }
}
