// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural validation of records.
//!
//! Pure functions returning every problem found (accumulated, not
//! short-circuited) so callers can reject an operation with structured
//! errors.

use crate::ids::RecordKind;
use crate::model::{
    Announcement, Change, ModificationType, Record, Status, WorkflowRecord,
};
use serde::Serialize;
use std::fmt;

/// One validation failure, addressable by JSON-path-like location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Where in the record the problem lies, e.g. `modifications[2]`.
    pub path: String,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.code, self.path, self.message)
    }
}

/// Validate either record family.
#[must_use]
pub fn validate_record(record: &Record) -> Vec<ValidationIssue> {
    match record {
        Record::Change(c) => validate_change(c),
        Record::Announcement(a) => validate_announcement(a),
    }
}

/// Validate a change record.
#[must_use]
pub fn validate_change(change: &Change) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if change.change_id.kind() != RecordKind::Change {
        issues.push(ValidationIssue::new(
            "change_id",
            "invalid_id",
            "change records need a CHANGE- identifier",
        ));
    }
    if change.object_type.announcement_type().is_some() {
        issues.push(ValidationIssue::new(
            "object_type",
            "object_type_mismatch",
            "object_type must be change",
        ));
    }
    if change.title.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "title",
            "missing_title",
            "title must not be empty",
        ));
    }
    if ccm_datetime::parse_timezone(&change.schedule.timezone).is_err() {
        issues.push(ValidationIssue::new(
            "schedule.timezone",
            "invalid_timezone",
            format!("{:?} is not an IANA zone", change.schedule.timezone),
        ));
    }
    if change.schedule.end_time <= change.schedule.start_time {
        issues.push(ValidationIssue::new(
            "schedule",
            "invalid_schedule",
            "end_time must be after start_time",
        ));
    }
    if change.status != Status::Draft && change.affected_customers.is_empty() {
        issues.push(ValidationIssue::new(
            "affected_customers",
            "missing_customers",
            "submitted records must name at least one customer",
        ));
    }
    check_meeting_flag(change.meeting_required, change, &mut issues);
    check_modifications(change, &mut issues);
    issues
}

/// Validate an announcement record.
#[must_use]
pub fn validate_announcement(announcement: &Announcement) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if announcement.announcement_id.kind() != RecordKind::Announcement {
        issues.push(ValidationIssue::new(
            "announcement_id",
            "invalid_id",
            "announcement records need a CIC-/FIN-/INN-/GEN- identifier",
        ));
    } else if announcement.announcement_id.announcement_type()
        != Some(announcement.announcement_type)
    {
        issues.push(ValidationIssue::new(
            "announcement_id",
            "announcement_type_mismatch",
            "identifier prefix does not match announcement_type",
        ));
    }
    if announcement.object_type.announcement_type() != Some(announcement.announcement_type) {
        issues.push(ValidationIssue::new(
            "object_type",
            "object_type_mismatch",
            "object_type must agree with announcement_type",
        ));
    }
    if announcement.title.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "title",
            "missing_title",
            "title must not be empty",
        ));
    }
    if announcement.summary.chars().count() > 500 {
        issues.push(ValidationIssue::new(
            "summary",
            "summary_too_long",
            "summary exceeds 500 characters",
        ));
    }
    if announcement.status == Status::Completed {
        issues.push(ValidationIssue::new(
            "status",
            "invalid_status",
            "announcements end at approved",
        ));
    }
    if announcement.status != Status::Draft && announcement.customers.is_empty() {
        issues.push(ValidationIssue::new(
            "customers",
            "missing_customers",
            "submitted records must name at least one customer",
        ));
    }
    for (i, attachment) in announcement.attachments.iter().enumerate() {
        if attachment.name.trim().is_empty() || attachment.store_key.trim().is_empty() {
            issues.push(ValidationIssue::new(
                format!("attachments[{i}]"),
                "invalid_attachment",
                "attachments need a name and a store key",
            ));
        }
    }
    check_meeting_flag(announcement.include_meeting, announcement, &mut issues);
    check_modifications(announcement, &mut issues);
    issues
}

/// Invariant: approved/completed records that require a meeting carry one.
///
/// Binding only once fan-out has run: the first per-customer fan-out
/// writes the meeting and its `processed` entry atomically, so a freshly
/// approved record legitimately has neither.
fn check_meeting_flag<R: WorkflowRecord + ?Sized>(
    required_flag: bool,
    record: &R,
    issues: &mut Vec<ValidationIssue>,
) {
    let status = record.status();
    let fanned_out = record
        .modifications()
        .iter()
        .any(|e| e.modification_type == ModificationType::Processed);
    if required_flag
        && fanned_out
        && matches!(status, Status::Approved | Status::Completed)
        && record.meeting_id().is_none()
    {
        issues.push(ValidationIssue::new(
            "meeting_id",
            "missing_meeting",
            "fanned-out records that require a meeting must carry meeting_id",
        ));
    }
}

/// Modification-log invariants shared by both families.
fn check_modifications<R: WorkflowRecord + ?Sized>(record: &R, issues: &mut Vec<ValidationIssue>) {
    let entries = record.modifications();

    match entries.first() {
        None => issues.push(ValidationIssue::new(
            "modifications",
            "missing_created",
            "the log must start with a created entry",
        )),
        Some(first) if first.modification_type != ModificationType::Created => {
            issues.push(ValidationIssue::new(
                "modifications[0]",
                "missing_created",
                "the first entry must be created",
            ));
        }
        Some(_) => {}
    }

    for (i, pair) in entries.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            issues.push(ValidationIssue::new(
                format!("modifications[{}]", i + 1),
                "modifications_out_of_order",
                "timestamps must be non-decreasing",
            ));
        }
    }

    let mut processed_codes = std::collections::BTreeSet::new();
    let mut live_meeting: Option<usize> = None;
    for (i, entry) in entries.iter().enumerate() {
        // Each workflow stage fans out independently; the duplicate
        // check resets at every boundary.
        if crate::modlog::is_stage_boundary(entry.modification_type) {
            processed_codes.clear();
        }
        match entry.modification_type {
            ModificationType::Processed => {
                match &entry.customer_code {
                    None => issues.push(ValidationIssue::new(
                        format!("modifications[{i}]"),
                        "missing_customer_code",
                        "processed entries must name the customer",
                    )),
                    Some(code) => {
                        if !processed_codes.insert(code.clone()) {
                            issues.push(ValidationIssue::new(
                                format!("modifications[{i}]"),
                                "duplicate_processed",
                                format!("customer {code} was already processed in this stage"),
                            ));
                        }
                    }
                }
            }
            ModificationType::MeetingScheduled => {
                if entry.meeting_metadata.is_none() {
                    issues.push(ValidationIssue::new(
                        format!("modifications[{i}]"),
                        "missing_meeting_metadata",
                        "meeting_scheduled entries must carry meeting_metadata",
                    ));
                }
                live_meeting = Some(i);
            }
            ModificationType::MeetingCancelled => {
                live_meeting = None;
            }
            _ => {}
        }
    }

    // The live meeting entry must agree with the top-level fields.
    if let Some(i) = live_meeting {
        if let Some(meta) = &entries[i].meeting_metadata {
            if record.meeting_id() != Some(meta.meeting_id.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("modifications[{i}].meeting_metadata"),
                    "meeting_fields_diverged",
                    "top-level meeting_id does not match the scheduled meeting",
                ));
            }
        }
    }

    // Cancelled records with a meeting on the books must have cancelled
    // it — once the cancellation fan-out has run. Before that the
    // meeting legitimately survives the status flip.
    let current_stage_processed = entries
        .iter()
        .rev()
        .take_while(|e| !crate::modlog::is_stage_boundary(e.modification_type))
        .any(|e| e.modification_type == ModificationType::Processed);
    if record.status() == Status::Cancelled && live_meeting.is_some() && current_stage_processed {
        issues.push(ValidationIssue::new(
            "modifications",
            "meeting_not_cancelled",
            "cancelled records must carry a meeting_cancelled entry",
        ));
    }
}
