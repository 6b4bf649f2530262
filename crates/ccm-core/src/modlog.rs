// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only modification log.
//!
//! Entries are only ever appended; timestamps never run backwards; the
//! derived top-level meeting fields track `meeting_scheduled` and
//! `meeting_cancelled` entries so the record and its log cannot drift.

use crate::model::{ModificationEntry, ModificationType, WorkflowRecord};

/// Append an entry, keeping the log's invariants.
///
/// Timestamps are clamped to be monotonic: an entry stamped earlier than
/// the current tail inherits the tail's timestamp. A `meeting_scheduled`
/// entry copies its metadata into the record's top-level meeting fields;
/// a `meeting_cancelled` entry clears them.
pub fn append<R: WorkflowRecord + ?Sized>(record: &mut R, mut entry: ModificationEntry) {
    if let Some(last) = record.modifications().last() {
        if entry.timestamp < last.timestamp {
            entry.timestamp = last.timestamp;
        }
    }

    match entry.modification_type {
        ModificationType::MeetingScheduled => {
            if let Some(meta) = &entry.meeting_metadata {
                record.set_meeting(meta.meeting_id.clone(), meta.join_url.clone());
            }
        }
        ModificationType::MeetingCancelled => record.clear_meeting(),
        _ => {}
    }

    record.modifications_mut().push(entry);
}

/// The most recent entry of the given type, if any.
///
/// Linear scan from the tail; logs stay well under a thousand entries.
#[must_use]
pub fn latest_of_type<'a, R: WorkflowRecord + ?Sized>(
    record: &'a R,
    modification_type: ModificationType,
) -> Option<&'a ModificationEntry> {
    record
        .modifications()
        .iter()
        .rev()
        .find(|e| e.modification_type == modification_type)
}

/// Whether an entry type marks a workflow-stage boundary.
///
/// Fan-out entries (`processed`, meeting bookkeeping) belong to the
/// stage opened by the most recent boundary; each transition opens a
/// fresh stage with its own per-customer fan-out.
#[must_use]
pub fn is_stage_boundary(modification_type: ModificationType) -> bool {
    matches!(
        modification_type,
        ModificationType::Created
            | ModificationType::Updated
            | ModificationType::Submitted
            | ModificationType::Approved
            | ModificationType::Cancelled
            | ModificationType::Completed
    )
}

/// Whether this customer's fan-out already ran for the current stage.
///
/// Scans the tail of the log back to the last stage boundary; a
/// `processed` entry from an earlier stage does not count.
#[must_use]
pub fn has_processed<R: WorkflowRecord + ?Sized>(record: &R, customer_code: &str) -> bool {
    record
        .modifications()
        .iter()
        .rev()
        .take_while(|e| !is_stage_boundary(e.modification_type))
        .any(|e| {
            e.modification_type == ModificationType::Processed
                && e.customer_code.as_deref() == Some(customer_code)
        })
}
