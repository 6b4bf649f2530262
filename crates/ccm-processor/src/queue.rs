// SPDX-License-Identifier: MIT OR Apache-2.0
//! The queue-side contract: trigger events, messages, and dispositions.

use ccm_error::Fault;
use serde::{Deserialize, Serialize};

/// Event emitted for every write under `customers/`.
///
/// `source_principal` identifies the role that performed the write, so
/// the processor can discard events caused by its own archive updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Bucket the write happened in.
    pub bucket: String,
    /// Full object key, `customers/{code}/{record_id}`.
    pub key: String,
    /// Principal ARN of the writer.
    pub source_principal: String,
}

/// One received queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Receipt handle used to acknowledge.
    pub id: String,
    /// The decoded event.
    pub event: TriggerEvent,
}

/// What the driver does with a message after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done (or nothing to do): acknowledge.
    Ack,
    /// Unrecoverable for this message: acknowledge and alert operators.
    AckAlert,
    /// Worth another delivery: leave unacknowledged.
    Retry,
}

impl Disposition {
    /// Classify a fault per the retry table.
    #[must_use]
    pub fn for_fault(fault: &Fault) -> Self {
        use ccm_error::FaultKind;
        match fault.kind {
            _ if fault.is_retryable() => Self::Retry,
            // Orphaned or structurally broken records need operator eyes.
            FaultKind::NotFound | FaultKind::Validation => Self::AckAlert,
            _ => Self::Ack,
        }
    }
}

/// The SQS-like per-customer message source.
#[async_trait::async_trait]
pub trait QueueSource: Send + Sync {
    /// Long-poll for up to `max` messages.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, Fault>;

    /// Acknowledge (delete) a message by id.
    async fn acknowledge(&self, message_id: &str) -> Result<(), Fault>;
}
