// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fault taxonomy for the customer contact manager.
//!
//! Every fallible operation in the workspace reports a [`Fault`]: a
//! stable [`FaultKind`] tag, a message, optional key-value details, and
//! an optional cause. The message driver never inspects component
//! internals to decide what to do with a failed queue message; it asks
//! the tag, and [`FaultKind::is_retryable`] is the whole policy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::error::Error;
use std::fmt;

/// Stable machine-readable fault tag.
///
/// The string form of each tag (see [`FaultKind::as_str`]) is part of
/// the operational contract: dashboards and alerts key on it, so tags
/// never change once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A record failed structural validation (schema, ID pattern, invariant).
    Validation,
    /// A workflow command is not legal for the record's current status.
    Precondition,
    /// A conditional write lost the race after exhausting its retries.
    VersionConflict,
    /// Network failure, throttling, 5xx, or timeout.
    Transient,
    /// Credentials were rejected and a refresh did not help.
    Authorization,
    /// The authoritative object is missing; the message is orphaned.
    NotFound,
    /// The meeting provider rejected or failed the call.
    Provider,
    /// The invocation deadline elapsed before the work finished.
    Cancellation,
}

/// Every tag, in declaration order. Handy for exhaustive tests and for
/// rendering the taxonomy in operator documentation.
pub const ALL_FAULT_KINDS: [FaultKind; 8] = [
    FaultKind::Validation,
    FaultKind::Precondition,
    FaultKind::VersionConflict,
    FaultKind::Transient,
    FaultKind::Authorization,
    FaultKind::NotFound,
    FaultKind::Provider,
    FaultKind::Cancellation,
];

impl FaultKind {
    /// The wire/log form of the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Validation => "VALIDATION",
            FaultKind::Precondition => "PRECONDITION",
            FaultKind::VersionConflict => "VERSION_CONFLICT",
            FaultKind::Transient => "TRANSIENT",
            FaultKind::Authorization => "AUTHORIZATION",
            FaultKind::NotFound => "NOT_FOUND",
            FaultKind::Provider => "PROVIDER",
            FaultKind::Cancellation => "CANCELLATION",
        }
    }

    /// Whether redelivering the message can plausibly succeed.
    ///
    /// Retryable faults describe conditions that pass on their own
    /// (contention, outages, deadlines). Everything else describes the
    /// message or the data itself, which no amount of redelivery fixes.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FaultKind::VersionConflict
                | FaultKind::Transient
                | FaultKind::Provider
                | FaultKind::Cancellation
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged failure, with optional diagnostic details and cause.
///
/// Details are key-value pairs stringified at attach time and rendered
/// in attach order, so a fault's display form is stable and cheap to
/// grep:
///
/// ```
/// use ccm_error::{Fault, FaultKind};
///
/// let fault = Fault::new(FaultKind::Transient, "object store timed out")
///     .with_context("key", "archive/CHANGE-2025-001")
///     .with_context("attempt", 3);
/// assert!(fault.is_retryable());
/// assert_eq!(
///     fault.to_string(),
///     "TRANSIENT object store timed out (key=archive/CHANGE-2025-001, attempt=3)",
/// );
/// ```
pub struct Fault {
    /// Machine-readable tag; drives the retry decision.
    pub kind: FaultKind,
    message: String,
    details: Vec<(&'static str, String)>,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl Fault {
    /// A fault with the given tag and message.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            cause: None,
        }
    }

    /// Attach one diagnostic detail. Later attachments render later.
    #[must_use]
    pub fn with_context(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.details.push((key, value.to_string()));
        self
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The human-readable message, without tag or details.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Look up a detail by key. First attachment wins on duplicates.
    #[must_use]
    pub fn context(&self, key: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether redelivery can plausibly succeed; delegates to the tag.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.message)?;
        if !self.details.is_empty() {
            f.write_str(" (")?;
            for (i, (key, value)) in self.details.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault[{self}]")?;
        if let Some(cause) = &self.cause {
            write!(f, " <- {cause}")?;
        }
        Ok(())
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}
