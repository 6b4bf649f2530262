// SPDX-License-Identifier: MIT OR Apache-2.0
//! The workflow state machine shared by changes and announcements.
//!
//! [`transition`] is a pure function: it decides the next status and
//! names the side effects, but performs none of them. The trigger
//! processor and the front-end facade execute what it names.

use crate::ids::RecordKind;
use crate::model::{Status, WorkflowRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An operator command against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Submit a draft for approval.
    Submit,
    /// Approve a submitted record.
    Approve,
    /// Cancel a submitted or approved record.
    Cancel,
    /// Mark an approved change as carried out.
    Complete,
    /// Edit content; approved records drop back to submitted.
    Edit,
    /// Remove the record entirely.
    Delete,
}

/// Side effects a transition names, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Create the cross-customer meeting before any notice goes out.
    ScheduleMeeting,
    /// Cancel the existing meeting before any notice goes out.
    CancelMeeting,
    /// Email the approval topic asking for sign-off.
    SendApprovalRequest,
    /// Email the announce topic that the record was approved.
    SendApprovedNotice,
    /// Email that the record was cancelled.
    SendCancellationNotice,
    /// Email that the change completed.
    SendCompletionNotice,
}

/// Where a legal transition lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// The record moves to this status.
    Status(Status),
    /// The record ceases to exist.
    Deleted,
}

/// Outcome of a legal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Next status, or deletion.
    pub next: NextState,
    /// Side effects to execute, in order.
    pub side_effects: Vec<SideEffect>,
}

/// A command that is not legal for the record's current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command:?} is not allowed from {from:?}: {reason}")]
pub struct PreconditionViolation {
    /// Status the record was in.
    pub from: Status,
    /// The rejected command.
    pub command: Command,
    /// Why the command is rejected.
    pub reason: &'static str,
}

impl PreconditionViolation {
    fn new(from: Status, command: Command, reason: &'static str) -> Self {
        Self {
            from,
            command,
            reason,
        }
    }
}

/// Decide the next state and side effects for `command` against `record`.
///
/// Meeting effects depend on the record: `approve` schedules a meeting
/// only when the record requires one, and `edit`/`cancel` from approved
/// cancel the meeting only when one exists. Meeting effects are ordered
/// before email effects so calendars update before notices land.
///
/// # Errors
///
/// Returns [`PreconditionViolation`] for every (status, command) pair the
/// state table does not permit.
pub fn transition<R: WorkflowRecord + ?Sized>(
    record: &R,
    command: Command,
) -> Result<Transition, PreconditionViolation> {
    let from = record.status();
    let reject = |reason| Err(PreconditionViolation::new(from, command, reason));

    match (from, command) {
        (Status::Draft, Command::Submit) => Ok(Transition {
            next: NextState::Status(Status::Submitted),
            side_effects: vec![SideEffect::SendApprovalRequest],
        }),
        (Status::Draft, Command::Delete) => Ok(Transition {
            next: NextState::Deleted,
            side_effects: vec![],
        }),
        (Status::Draft, Command::Cancel) => reject("drafts are deleted, not cancelled"),

        (Status::Submitted, Command::Approve) => {
            let mut side_effects = Vec::new();
            if record.meeting_required() {
                side_effects.push(SideEffect::ScheduleMeeting);
            }
            side_effects.push(SideEffect::SendApprovedNotice);
            Ok(Transition {
                next: NextState::Status(Status::Approved),
                side_effects,
            })
        }
        (Status::Submitted, Command::Cancel) => Ok(Transition {
            next: NextState::Status(Status::Cancelled),
            side_effects: vec![],
        }),
        (Status::Submitted, Command::Edit) => Ok(Transition {
            next: NextState::Status(Status::Submitted),
            side_effects: vec![],
        }),
        (Status::Submitted, Command::Delete) => reject("must cancel first"),

        (Status::Approved, Command::Edit) => {
            let mut side_effects = Vec::new();
            if record.meeting_id().is_some() {
                side_effects.push(SideEffect::CancelMeeting);
            }
            side_effects.push(SideEffect::SendApprovalRequest);
            Ok(Transition {
                next: NextState::Status(Status::Submitted),
                side_effects,
            })
        }
        (Status::Approved, Command::Complete) => {
            if record.kind() == RecordKind::Announcement {
                return reject("announcements end at approved");
            }
            Ok(Transition {
                next: NextState::Status(Status::Completed),
                side_effects: vec![SideEffect::SendCompletionNotice],
            })
        }
        (Status::Approved, Command::Cancel) => {
            let mut side_effects = Vec::new();
            if record.meeting_id().is_some() {
                side_effects.push(SideEffect::CancelMeeting);
            }
            side_effects.push(SideEffect::SendCancellationNotice);
            Ok(Transition {
                next: NextState::Status(Status::Cancelled),
                side_effects,
            })
        }
        (Status::Approved, Command::Delete) => reject("must cancel first"),

        (Status::Cancelled, Command::Delete) => Ok(Transition {
            next: NextState::Deleted,
            side_effects: vec![],
        }),

        (Status::Completed, _) => reject("completed is terminal"),

        _ => reject("command not defined for this status"),
    }
}
