// SPDX-License-Identifier: MIT OR Apache-2.0
//! Operator commands against the archive.
//!
//! The front-end facade owns request parsing and content replacement;
//! what it delegates here is the transition itself: ask the workflow
//! engine, execute the facade-side effects, and persist the new status
//! with its audit entry through a conditional write. Meeting
//! cancellation is the one side effect that runs here — an approved
//! record edited or cancelled must drop its meeting immediately, before
//! any fan-out happens. Notice emails and meeting creation are
//! per-customer work and run in [`TriggerProcessor`](crate::TriggerProcessor)
//! once the front-end writes the triggers.

use ccm_archive::ArchiveUpdater;
use ccm_config::AppConfig;
use ccm_core::{
    Command, ModificationEntry, ModificationType, NextState, Record, SideEffect, WorkflowRecord,
    decode_record, modlog, transition, validate_record,
};
use ccm_email::EmailGateway;
use ccm_error::{Fault, FaultKind};
use ccm_meeting::{MeetingProvider, MeetingService};
use ccm_store::{ObjectStore, archive_key};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Applies workflow commands on behalf of the facade.
pub struct CommandExecutor {
    config: Arc<AppConfig>,
    store: Arc<dyn ObjectStore>,
    gateway: Arc<dyn EmailGateway>,
    provider: Arc<dyn MeetingProvider>,
}

impl CommandExecutor {
    /// Executor over the same collaborators the processor uses.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn ObjectStore>,
        gateway: Arc<dyn EmailGateway>,
        provider: Arc<dyn MeetingProvider>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            provider,
        }
    }

    /// Apply `command` to the record, as `actor`.
    ///
    /// Returns the record as persisted, or `None` when the command
    /// deleted it. The status flip, its audit entry, and any
    /// `meeting_cancelled` entry land in one conditional write; the
    /// remote meeting is cancelled first so calendars clear even if the
    /// write then loses its race and retries.
    ///
    /// # Errors
    ///
    /// [`FaultKind::Precondition`] when the workflow engine rejects the
    /// command, [`FaultKind::Validation`] when the mutated record would
    /// violate an invariant, and store/provider faults pass through.
    pub async fn apply(
        &self,
        record_id: &str,
        command: Command,
        actor: &str,
    ) -> Result<Option<Record>, Fault> {
        let key = archive_key(record_id);
        let (body, _) = self.store.get(&key).await.map_err(Fault::from)?;
        let record = decode_record(&body).map_err(|e| {
            Fault::new(FaultKind::Validation, "archive body is not a valid record")
                .with_context("record_id", record_id)
                .with_source(e)
        })?;

        let decided = transition(&record, command).map_err(precondition)?;

        // The engine only names CancelMeeting when a meeting exists.
        if decided.side_effects.contains(&SideEffect::CancelMeeting) {
            if let Some(meeting_id) = record.meeting_id() {
                let meetings = MeetingService::new(
                    self.gateway.clone(),
                    self.provider.clone(),
                    self.config.clone(),
                );
                meetings.cancel_meeting(meeting_id).await?;
                info!(record_id, meeting_id, "meeting cancelled ahead of transition");
            }
        }

        if decided.next == NextState::Deleted {
            self.store.delete(&key).await.map_err(Fault::from)?;
            info!(record_id, ?command, "record deleted");
            return Ok(None);
        }

        let updater = ArchiveUpdater::new(self.store.clone(), actor)
            .with_max_retries(self.config.processing.max_etag_retries);
        let actor = actor.to_string();
        let updated = updater
            .update(record_id, move |record| {
                // Decide against the fresh record: a concurrent command
                // may have moved it since we looked.
                let decided = transition(record, command).map_err(precondition)?;
                let NextState::Status(next) = decided.next else {
                    return Err(precondition_message(command, "deletion races a live update"));
                };

                if decided.side_effects.contains(&SideEffect::CancelMeeting)
                    && record.meeting_id().is_some()
                {
                    modlog::append(
                        record,
                        ModificationEntry::new(
                            ModificationType::MeetingCancelled,
                            actor.clone(),
                            Utc::now(),
                        ),
                    );
                }

                record.set_status(next);
                modlog::append(
                    record,
                    ModificationEntry::new(audit_entry(command), actor.clone(), Utc::now()),
                );

                let issues = validate_record(record);
                if issues.is_empty() {
                    Ok(())
                } else {
                    let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
                    Err(
                        Fault::new(FaultKind::Validation, "transition would corrupt the record")
                            .with_context("issues", rendered.join("; ")),
                    )
                }
            })
            .await?;

        info!(record_id, ?command, status = ?updated.status(), "command applied");
        Ok(Some(updated))
    }
}

/// The audit entry a successful command leaves behind.
fn audit_entry(command: Command) -> ModificationType {
    match command {
        Command::Submit => ModificationType::Submitted,
        Command::Approve => ModificationType::Approved,
        Command::Cancel => ModificationType::Cancelled,
        Command::Complete => ModificationType::Completed,
        Command::Edit => ModificationType::Updated,
        // Deletions never reach the conditional-write path.
        Command::Delete => ModificationType::Deleted,
    }
}

fn precondition(violation: ccm_core::PreconditionViolation) -> Fault {
    Fault::new(FaultKind::Precondition, violation.to_string())
}

fn precondition_message(command: Command, reason: &str) -> Fault {
    Fault::new(FaultKind::Precondition, format!("{command:?} rejected: {reason}"))
}
