// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP gateway to per-customer email services.
//!
//! Each customer's service lives behind a region-derived endpoint and
//! accepts brokered short-lived credentials. A rejected request triggers
//! exactly one credential refresh before the failure is reported as
//! fatal for that customer.

use crate::{EmailError, EmailGateway, Topic};
use async_trait::async_trait;
use ccm_config::AppConfig;
use ccm_credentials::{CredentialBroker, CredentialError, Credentials};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Gateway over HTTP email services, one endpoint per customer region.
pub struct HttpEmailGateway {
    client: reqwest::Client,
    config: Arc<AppConfig>,
    broker: Arc<CredentialBroker>,
}

#[derive(Debug, Deserialize)]
struct SubscribersResponse {
    subscribers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipients: &'a [String],
    subject: &'a str,
    html_body: &'a str,
}

impl HttpEmailGateway {
    /// Gateway using the given client, configuration, and broker.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        config: Arc<AppConfig>,
        broker: Arc<CredentialBroker>,
    ) -> Self {
        Self {
            client,
            config,
            broker,
        }
    }

    fn topic_url(&self, customer_code: &str, topic: Topic, tail: &str) -> Result<String, EmailError> {
        let customer = self
            .config
            .customer(customer_code)
            .ok_or_else(|| EmailError::Unauthorized {
                customer_code: customer_code.to_string(),
            })?;
        Ok(format!(
            "{}/topics/{}/{tail}",
            self.config.email_endpoint(customer),
            topic.name()
        ))
    }

    fn map_credential_error(err: CredentialError) -> EmailError {
        match err {
            CredentialError::Unavailable {
                customer_code,
                reason,
            } => EmailError::Transient {
                customer_code,
                reason,
            },
            CredentialError::CustomerUnknown(code) => EmailError::Unauthorized {
                customer_code: code,
            },
            CredentialError::Denied { customer_code, .. } => {
                EmailError::Unauthorized { customer_code }
            }
        }
    }

    /// Issue `build(credentials)` with a single refresh on rejection.
    async fn with_credentials<F>(
        &self,
        customer_code: &str,
        mut build: F,
    ) -> Result<reqwest::Response, EmailError>
    where
        F: FnMut(&Credentials) -> reqwest::RequestBuilder,
    {
        let mut refreshed = false;
        loop {
            let credentials = if refreshed {
                self.broker.refresh(customer_code).await
            } else {
                self.broker.credentials_for(customer_code).await
            }
            .map_err(Self::map_credential_error)?;

            let response = build(&credentials)
                .bearer_auth(&credentials.session_token)
                .header("x-access-key-id", &credentials.access_key_id)
                .send()
                .await
                .map_err(|e| EmailError::Transient {
                    customer_code: customer_code.to_string(),
                    reason: e.to_string(),
                })?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if !refreshed => {
                    debug!(customer_code, "email service rejected credentials; refreshing once");
                    refreshed = true;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(EmailError::Unauthorized {
                        customer_code: customer_code.to_string(),
                    });
                }
                status if status.is_success() => return Ok(response),
                status => {
                    return Err(EmailError::Transient {
                        customer_code: customer_code.to_string(),
                        reason: format!("unexpected status {status}"),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl EmailGateway for HttpEmailGateway {
    async fn list_subscribers(
        &self,
        customer_code: &str,
        topic: Topic,
    ) -> Result<Vec<String>, EmailError> {
        let url = self.topic_url(customer_code, topic, "subscribers")?;
        let response = self
            .with_credentials(customer_code, |_| self.client.get(&url))
            .await?;
        let parsed: SubscribersResponse =
            response.json().await.map_err(|e| EmailError::Transient {
                customer_code: customer_code.to_string(),
                reason: e.to_string(),
            })?;
        Ok(parsed.subscribers)
    }

    async fn send(
        &self,
        customer_code: &str,
        topic: Topic,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let url = self.topic_url(customer_code, topic, "messages")?;
        let payload = SendRequest {
            recipients,
            subject,
            html_body,
        };
        self.with_credentials(customer_code, |_| self.client.post(&url).json(&payload))
            .await?;
        Ok(())
    }
}
