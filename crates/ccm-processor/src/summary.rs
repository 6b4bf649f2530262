// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-invocation counters.
//!
//! Routine success paths never log per-event lines; they bump counters
//! here, and the whole bag goes out as one structured line when the
//! invocation ends.

use serde::Serialize;

/// Counter bag carried through one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    /// Messages taken off the queue.
    pub total_messages: u64,
    /// Messages that finished cleanly (including idempotent skips).
    pub successful_messages: u64,
    /// Faults that left a message eligible for redelivery.
    pub retryable_errors: u64,
    /// Faults that consumed the message.
    pub non_retryable_errors: u64,
    /// Events discarded because the processor caused them.
    pub discarded_events: u64,
    /// Per-customer fan-outs that executed side effects.
    pub customers_processed: u64,
    /// Recipients notices went to.
    pub emails_sent: u64,
    /// Subscribers before restriction filtering.
    pub emails_before_filter: u64,
    /// Subscribers dropped by allow-lists.
    pub emails_filtered: u64,
    /// Failed email dispatches.
    pub email_errors: u64,
    /// Meetings created.
    pub meetings_scheduled: u64,
    /// Meetings cancelled.
    pub meetings_cancelled: u64,
    /// Failed meeting-provider calls and subscriber fetches.
    pub meeting_errors: u64,
    /// Calendar subscribers fetched, before dedup and filtering.
    pub total_attendees: u64,
    /// Attendees on the meeting after dedup and filtering.
    pub final_attendee_count: u64,
    /// Object-store reads.
    pub s3_downloads: u64,
    /// Object-store writes.
    pub s3_uploads: u64,
    /// Object-store deletes.
    pub s3_deletes: u64,
    /// Object-store failures.
    pub s3_errors: u64,
    /// Approval-request notices dispatched.
    pub approval_requests: u64,
    /// Approved records fanned out.
    pub approved_changes: u64,
    /// Completed records fanned out.
    pub completed_changes: u64,
    /// Cancelled records fanned out.
    pub cancelled_changes: u64,
    /// Rendered fault messages, in arrival order.
    pub error_messages: Vec<String>,
}

impl ExecutionSummary {
    /// A zeroed bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault, bumping the matching retry counter.
    pub fn record_fault(&mut self, fault: &ccm_error::Fault) {
        if fault.is_retryable() {
            self.retryable_errors += 1;
        } else {
            self.non_retryable_errors += 1;
        }
        self.error_messages.push(fault.to_string());
    }

    /// Fold another bag into this one.
    pub fn merge(&mut self, other: Self) {
        self.total_messages += other.total_messages;
        self.successful_messages += other.successful_messages;
        self.retryable_errors += other.retryable_errors;
        self.non_retryable_errors += other.non_retryable_errors;
        self.discarded_events += other.discarded_events;
        self.customers_processed += other.customers_processed;
        self.emails_sent += other.emails_sent;
        self.emails_before_filter += other.emails_before_filter;
        self.emails_filtered += other.emails_filtered;
        self.email_errors += other.email_errors;
        self.meetings_scheduled += other.meetings_scheduled;
        self.meetings_cancelled += other.meetings_cancelled;
        self.meeting_errors += other.meeting_errors;
        self.total_attendees += other.total_attendees;
        self.final_attendee_count += other.final_attendee_count;
        self.s3_downloads += other.s3_downloads;
        self.s3_uploads += other.s3_uploads;
        self.s3_deletes += other.s3_deletes;
        self.s3_errors += other.s3_errors;
        self.approval_requests += other.approval_requests;
        self.approved_changes += other.approved_changes;
        self.completed_changes += other.completed_changes;
        self.cancelled_changes += other.cancelled_changes;
        self.error_messages.extend(other.error_messages);
    }

    /// Emit the bag as one structured log line.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(rendered) => tracing::info!(summary = %rendered, "invocation complete"),
            Err(err) => tracing::warn!(error = %err, "execution summary failed to serialize"),
        }
    }
}
