// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-core
//!
//! The stable record contract for the customer contact manager.
//!
//! Changes and announcements share one workflow state machine and one
//! append-only modification log; this crate defines those shapes, the
//! structural validator, and nothing else. No I/O happens here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Canonical record identifiers and their patterns.
pub mod ids;
/// Record shapes stored at `archive/{id}`.
pub mod model;
/// The append-only modification log.
pub mod modlog;
/// Structural validation of records.
pub mod validate;
/// The workflow state machine.
pub mod workflow;

pub use ids::{IdError, RecordId, RecordKind};
pub use model::{
    Announcement, AnnouncementType, Attachment, Change, MeetingMetadata, ModificationEntry,
    ModificationType, ObjectType, Record, Schedule, Status, WorkflowRecord, decode_record,
    duplicate, encode_record,
};
pub use validate::{ValidationIssue, validate_announcement, validate_change, validate_record};
pub use workflow::{
    Command, NextState, PreconditionViolation, SideEffect, Transition, transition,
};
