// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP long-poll client for one customer's queue.

use async_trait::async_trait;
use ccm_error::{Fault, FaultKind};
use ccm_processor::{QueueMessage, QueueSource, TriggerEvent};
use serde::Deserialize;

/// Client for `{endpoint}/queues/{queue_identifier}`.
#[derive(Debug, Clone)]
pub struct HttpQueueSource {
    client: reqwest::Client,
    endpoint: String,
    queue_identifier: String,
    wait_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct ReceiveResponse {
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    event: TriggerEvent,
}

impl HttpQueueSource {
    /// Client for one queue behind `endpoint`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        queue_identifier: impl Into<String>,
        wait_seconds: u64,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            queue_identifier: queue_identifier.into(),
            wait_seconds,
        }
    }

    /// The queue this client polls.
    #[must_use]
    pub fn queue_identifier(&self) -> &str {
        &self.queue_identifier
    }

    fn transient(&self, err: &reqwest::Error) -> Fault {
        Fault::new(FaultKind::Transient, "queue request failed")
            .with_context("queue", self.queue_identifier.as_str())
            .with_context("reason", err.to_string())
    }
}

#[async_trait]
impl QueueSource for HttpQueueSource {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, Fault> {
        let response = self
            .client
            .get(format!(
                "{}/queues/{}/messages",
                self.endpoint, self.queue_identifier
            ))
            .query(&[
                ("max", max.to_string()),
                ("wait", self.wait_seconds.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.transient(&e))?;

        if !response.status().is_success() {
            return Err(Fault::new(FaultKind::Transient, "queue receive failed")
                .with_context("queue", self.queue_identifier.as_str())
                .with_context("status", response.status().as_u16()));
        }

        let parsed: ReceiveResponse = response.json().await.map_err(|e| self.transient(&e))?;
        Ok(parsed
            .messages
            .into_iter()
            .map(|m| QueueMessage {
                id: m.id,
                event: m.event,
            })
            .collect())
    }

    async fn acknowledge(&self, message_id: &str) -> Result<(), Fault> {
        let response = self
            .client
            .delete(format!(
                "{}/queues/{}/messages/{message_id}",
                self.endpoint, self.queue_identifier
            ))
            .send()
            .await
            .map_err(|e| self.transient(&e))?;

        // An already-deleted message is fine; redelivery is handled by
        // the processor's idempotency probe anyway.
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Fault::new(FaultKind::Transient, "queue acknowledge failed")
                .with_context("queue", self.queue_identifier.as_str())
                .with_context("status", response.status().as_u16()))
        }
    }
}
