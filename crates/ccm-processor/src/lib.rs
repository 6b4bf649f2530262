// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-processor
//!
//! Drives one queue message to completion.
//!
//! The pipeline per message: discard self-caused events, probe the
//! trigger (idempotency), load and validate the archive, execute the
//! status-appropriate side effects (meeting before email), persist the
//! outcome through a conditional archive write, delete the trigger, and
//! classify any failure into ack / retry / escalate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Operator commands applied on behalf of the facade.
pub mod command;
/// Store wrapper counting operations for the summary.
pub mod counting;
/// Queue contract: events, messages, dispositions.
pub mod queue;
/// Per-invocation counters.
pub mod summary;

pub use command::CommandExecutor;
pub use counting::{CountingStore, StoreCounters};
pub use queue::{Disposition, QueueMessage, QueueSource, TriggerEvent};
pub use summary::ExecutionSummary;

use ccm_archive::ArchiveUpdater;
use ccm_config::{AppConfig, CustomerDescriptor};
use ccm_core::{
    ModificationEntry, ModificationType, Record, Status, WorkflowRecord, decode_record, modlog,
    validate_record,
};
use ccm_email::{EmailDispatcher, EmailGateway, TemplateKind, Topic};
use ccm_error::{Fault, FaultKind};
use ccm_meeting::{MeetingProvider, MeetingService};
use ccm_store::{ObjectStore, archive_key, parse_trigger_key, trigger_key};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

/// Processes trigger events for every customer of one deployment.
pub struct TriggerProcessor {
    config: Arc<AppConfig>,
    store: Arc<dyn ObjectStore>,
    gateway: Arc<dyn EmailGateway>,
    provider: Arc<dyn MeetingProvider>,
    deadline: Duration,
}

impl TriggerProcessor {
    /// Processor over the given store, email gateway, and meeting
    /// provider.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn ObjectStore>,
        gateway: Arc<dyn EmailGateway>,
        provider: Arc<dyn MeetingProvider>,
    ) -> Self {
        let deadline = Duration::from_secs(config.processing.invocation_deadline_secs);
        Self {
            config,
            store,
            gateway,
            provider,
            deadline,
        }
    }

    /// Drive one event to completion and say what to do with its message.
    pub async fn process_message(
        &self,
        event: &TriggerEvent,
        summary: &mut ExecutionSummary,
    ) -> Disposition {
        summary.total_messages += 1;

        // Step 1: events caused by our own archive writes feed back here;
        // drop them or the loop never terminates.
        if event.source_principal == self.config.processor_principal {
            debug!(key = event.key.as_str(), "discarding self-caused event");
            summary.discarded_events += 1;
            return Disposition::Ack;
        }
        if event.bucket != self.config.bucket {
            warn!(
                bucket = event.bucket.as_str(),
                "event for a foreign bucket; discarding"
            );
            summary.discarded_events += 1;
            return Disposition::Ack;
        }

        let counters = Arc::new(StoreCounters::default());
        let store = CountingStore::new(self.store.clone(), counters.clone());
        let archive_attempted = AtomicBool::new(false);
        let archive_updated = AtomicBool::new(false);

        let worked = tokio::time::timeout(
            self.deadline,
            self.run_steps(event, &store, &archive_attempted, &archive_updated, summary),
        )
        .await;
        let outcome = match worked {
            Ok(result) => result,
            Err(_elapsed) => Err(Fault::new(
                FaultKind::Cancellation,
                "invocation deadline elapsed",
            )
            .with_context("deadline_secs", self.deadline.as_secs())),
        };

        let disposition = match outcome {
            Ok(()) => {
                summary.successful_messages += 1;
                Disposition::Ack
            }
            Err(fault) => {
                // The archive may already reflect the work; clearing the
                // trigger stops infinite redelivery, and the step-2 probe
                // covers any duplicate that slips through.
                let clear_trigger = archive_attempted.load(Ordering::SeqCst)
                    || archive_updated.load(Ordering::SeqCst);
                if clear_trigger {
                    if let Some((code, id)) = parse_trigger_key(&event.key) {
                        if let Err(err) = store.delete(&trigger_key(code, id)).await {
                            warn!(error = %err, "post-failure trigger delete failed");
                        }
                    }
                }
                warn!(key = event.key.as_str(), error = %fault, "message processing failed");
                summary.record_fault(&fault);
                Disposition::for_fault(&fault)
            }
        };

        let (downloads, uploads, deletes, errors) = counters.snapshot();
        summary.s3_downloads += downloads;
        summary.s3_uploads += uploads;
        summary.s3_deletes += deletes;
        summary.s3_errors += errors;

        disposition
    }

    /// Steps 2–7 of the pipeline.
    async fn run_steps(
        &self,
        event: &TriggerEvent,
        store: &CountingStore,
        archive_attempted: &AtomicBool,
        archive_updated: &AtomicBool,
        summary: &mut ExecutionSummary,
    ) -> Result<(), Fault> {
        let (customer_code, record_id) = parse_trigger_key(&event.key).ok_or_else(|| {
            Fault::new(FaultKind::Validation, "event key is not a trigger key")
                .with_context("key", event.key.as_str())
        })?;

        // Step 2: the trigger's existence is the lease. Gone means a
        // previous delivery finished the job.
        let trigger = trigger_key(customer_code, record_id);
        if store.head(&trigger).await.map_err(Fault::from)?.is_none() {
            debug!(key = trigger.as_str(), "trigger already handled; skipping");
            return Ok(());
        }

        // Step 3: the archive is the only truth; the trigger body is
        // never consulted.
        let (body, _) = store
            .get(&archive_key(record_id))
            .await
            .map_err(Fault::from)?;
        let record = decode_record(&body).map_err(|e| {
            Fault::new(FaultKind::Validation, "archive body is not a valid record")
                .with_context("record_id", record_id)
                .with_source(e)
        })?;
        let issues = validate_record(&record);
        if !issues.is_empty() {
            let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
            return Err(
                Fault::new(FaultKind::Validation, "archive record failed validation")
                    .with_context("record_id", record_id)
                    .with_context("issues", rendered.join("; ")),
            );
        }

        // Replay guard: archive already reflects this customer but the
        // trigger survived a failed delete. Clear it and stop before any
        // side effect repeats.
        if modlog::has_processed(&record, customer_code) {
            debug!(
                customer_code,
                record_id, "archive already processed; clearing stale trigger"
            );
            self.best_effort_delete(store, &trigger).await;
            return Ok(());
        }

        let customer = self
            .config
            .customer(customer_code)
            .ok_or_else(|| {
                Fault::new(FaultKind::Validation, "trigger for a customer not in the directory")
                    .with_context("customer_code", customer_code)
            })?
            .clone();

        // Steps 4–6.
        self.fan_out(
            &record,
            &customer,
            record_id,
            store,
            archive_attempted,
            archive_updated,
            summary,
        )
        .await?;

        // Step 7: non-fatal; the archive already holds the outcome.
        self.best_effort_delete(store, &trigger).await;
        Ok(())
    }

    /// Steps 4–6: classify by status, run side effects, persist.
    #[allow(clippy::too_many_arguments)]
    async fn fan_out(
        &self,
        record: &Record,
        customer: &CustomerDescriptor,
        record_id: &str,
        store: &CountingStore,
        archive_attempted: &AtomicBool,
        archive_updated: &AtomicBool,
        summary: &mut ExecutionSummary,
    ) -> Result<(), Fault> {
        let dispatcher = EmailDispatcher::new(self.gateway.clone());
        let updater = ArchiveUpdater::new(store.clone(), self.config.processor_principal.clone())
            .with_max_retries(self.config.processing.max_etag_retries);
        let customer_code = customer.customer_code.clone();

        match record.status() {
            Status::Draft => {
                // Triggers exist only from submission onward; a draft
                // trigger is front-end noise.
                warn!(record_id, "trigger for a draft record; nothing to do");
                return Ok(());
            }
            Status::Submitted => {
                let outcome = match dispatcher
                    .dispatch(customer, Topic::Approval, TemplateKind::ApprovalRequest, record)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(fault) => {
                        summary.email_errors += 1;
                        return Err(fault);
                    }
                };
                fold_dispatch(summary, outcome);
                summary.approval_requests += 1;

                archive_attempted.store(true, Ordering::SeqCst);
                updater.append_processed(record_id, &customer_code).await?;
            }
            Status::Approved => {
                let created = if record.meeting_required() && record.meeting_id().is_none() {
                    let meetings = MeetingService::new(
                        self.gateway.clone(),
                        self.provider.clone(),
                        self.config.clone(),
                    );
                    let codes: Vec<String> = record.customer_codes().iter().cloned().collect();
                    let outcome = match meetings.create_meeting(record, &codes).await {
                        Ok(outcome) => outcome,
                        Err(fault) => {
                            summary.meeting_errors += 1;
                            return Err(fault);
                        }
                    };
                    summary.meetings_scheduled += 1;
                    summary.meeting_errors += outcome.gathering.fetch_errors;
                    summary.total_attendees += outcome.gathering.total_attendees;
                    summary.final_attendee_count += outcome.metadata.attendees.len() as u64;
                    Some(outcome.metadata)
                } else {
                    None
                };

                // The approved notice carries the join URL, so render
                // against the record as it will be persisted.
                let enriched = match &created {
                    Some(meta) => {
                        let mut copy = record.clone();
                        copy.set_meeting(meta.meeting_id.clone(), meta.join_url.clone());
                        copy
                    }
                    None => record.clone(),
                };
                let outcome = match dispatcher
                    .dispatch(
                        customer,
                        notice_topic(record),
                        TemplateKind::ApprovedNotice,
                        &enriched,
                    )
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(fault) => {
                        summary.email_errors += 1;
                        return Err(fault);
                    }
                };
                fold_dispatch(summary, outcome);
                summary.approved_changes += 1;

                archive_attempted.store(true, Ordering::SeqCst);
                match created {
                    Some(metadata) => {
                        updater
                            .set_meeting_and_processed(record_id, &customer_code, metadata)
                            .await?;
                    }
                    None => {
                        updater.append_processed(record_id, &customer_code).await?;
                    }
                }
            }
            Status::Cancelled => {
                // Calendars update before the cancellation mail lands.
                if let Some(meeting_id) = record.meeting_id() {
                    let meetings = MeetingService::new(
                        self.gateway.clone(),
                        self.provider.clone(),
                        self.config.clone(),
                    );
                    match meetings.cancel_meeting(meeting_id).await {
                        Ok(true) => summary.meetings_cancelled += 1,
                        Ok(false) => {}
                        Err(fault) => {
                            summary.meeting_errors += 1;
                            return Err(fault);
                        }
                    }
                }

                // Only records that were announced as approved get a
                // cancellation notice; a submitted record dies quietly.
                let was_announced =
                    modlog::latest_of_type(record, ModificationType::Approved).is_some();
                if was_announced {
                    let outcome = match dispatcher
                        .dispatch(
                            customer,
                            notice_topic(record),
                            TemplateKind::CancellationNotice,
                            record,
                        )
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(fault) => {
                            summary.email_errors += 1;
                            return Err(fault);
                        }
                    };
                    fold_dispatch(summary, outcome);
                }
                summary.cancelled_changes += 1;

                archive_attempted.store(true, Ordering::SeqCst);
                let actor = self.config.processor_principal.clone();
                let code = customer_code.clone();
                updater
                    .update(record_id, move |record| {
                        if record.meeting_id().is_some() {
                            modlog::append(
                                record,
                                ModificationEntry::new(
                                    ModificationType::MeetingCancelled,
                                    actor.clone(),
                                    Utc::now(),
                                ),
                            );
                        }
                        if !modlog::has_processed(record, &code) {
                            modlog::append(
                                record,
                                ModificationEntry::new(
                                    ModificationType::Processed,
                                    actor.clone(),
                                    Utc::now(),
                                )
                                .with_customer(code.clone()),
                            );
                        }
                        Ok(())
                    })
                    .await?;
            }
            Status::Completed => {
                let outcome = match dispatcher
                    .dispatch(
                        customer,
                        notice_topic(record),
                        TemplateKind::CompletionNotice,
                        record,
                    )
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(fault) => {
                        summary.email_errors += 1;
                        return Err(fault);
                    }
                };
                fold_dispatch(summary, outcome);
                summary.completed_changes += 1;

                archive_attempted.store(true, Ordering::SeqCst);
                updater.append_processed(record_id, &customer_code).await?;
            }
        }

        archive_updated.store(true, Ordering::SeqCst);
        summary.customers_processed += 1;
        Ok(())
    }

    async fn best_effort_delete(&self, store: &CountingStore, key: &str) {
        if let Err(err) = store.delete(key).await {
            // Step 2 short-circuits the duplicate this leaves behind.
            warn!(key, error = %err, "trigger delete failed; duplicate event will skip");
        }
    }
}

/// The topic an approved/cancelled/completed notice goes to.
fn notice_topic(record: &Record) -> Topic {
    match record {
        Record::Change(_) => Topic::Announce,
        Record::Announcement(a) => Topic::for_announcement(a.announcement_type),
    }
}

fn fold_dispatch(summary: &mut ExecutionSummary, outcome: ccm_email::DispatchOutcome) {
    summary.emails_sent += outcome.emails_sent;
    summary.emails_before_filter += outcome.emails_before_filter;
    summary.emails_filtered += outcome.emails_filtered;
}

/// Receive one batch from a queue, process it, and acknowledge per
/// disposition. Returns the invocation's summary after emitting it.
///
/// # Errors
///
/// Returns the queue's fault when receiving fails; per-message faults
/// are absorbed into the summary.
pub async fn drive_once<Q: QueueSource>(
    processor: &TriggerProcessor,
    queue: &Q,
    max_messages: usize,
) -> Result<ExecutionSummary, Fault> {
    let invocation_id = Uuid::new_v4();
    let span = info_span!("invocation", id = %invocation_id);

    async {
        let messages = queue.receive(max_messages).await?;
        let mut summary = ExecutionSummary::new();

        for message in messages {
            let disposition = processor.process_message(&message.event, &mut summary).await;
            match disposition {
                Disposition::Ack => queue.acknowledge(&message.id).await?,
                Disposition::AckAlert => {
                    error!(
                        message_id = message.id.as_str(),
                        key = message.event.key.as_str(),
                        "unrecoverable message; acknowledged for operator follow-up"
                    );
                    queue.acknowledge(&message.id).await?;
                }
                Disposition::Retry => {
                    debug!(
                        message_id = message.id.as_str(),
                        "leaving message for redelivery"
                    );
                }
            }
        }

        summary.emit();
        Ok(summary)
    }
    .instrument(span)
    .await
}
