// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP client for the remote meeting provider.
//!
//! The provider is a plain remote procedure: `POST /meetings` with an
//! `Idempotency-Key` header creates or returns the meeting for that key,
//! `DELETE /meetings/{id}` cancels. Timestamps go over the wire in the
//! provider's seven-fractional-digit UTC form.

use crate::{MeetingError, MeetingProvider, MeetingRequest, ProvisionedMeeting};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Client for one provider endpoint.
#[derive(Debug, Clone)]
pub struct HttpMeetingProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateMeetingRequest<'a> {
    subject: &'a str,
    start_time: String,
    end_time: String,
    organizer: &'a str,
    attendees: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateMeetingResponse {
    meeting_id: String,
    join_url: String,
}

impl HttpMeetingProvider {
    /// Client against `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn unavailable(err: &reqwest::Error) -> MeetingError {
        MeetingError::Unavailable {
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl MeetingProvider for HttpMeetingProvider {
    async fn create(&self, request: &MeetingRequest) -> Result<ProvisionedMeeting, MeetingError> {
        let payload = CreateMeetingRequest {
            subject: &request.subject,
            start_time: ccm_datetime::format_provider(request.start_time),
            end_time: ccm_datetime::format_provider(request.end_time),
            organizer: &request.organizer,
            attendees: request.attendees.iter().map(String::as_str).collect(),
        };

        let response = self
            .client
            .post(format!("{}/meetings", self.base_url))
            .header("idempotency-key", &request.idempotency_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::unavailable(&e))?;

        match response.status() {
            status if status.is_success() => {
                let parsed: CreateMeetingResponse =
                    response.json().await.map_err(|e| Self::unavailable(&e))?;
                Ok(ProvisionedMeeting {
                    meeting_id: parsed.meeting_id,
                    join_url: parsed.join_url,
                })
            }
            status if status.is_client_error() => Err(MeetingError::Rejected {
                reason: format!("provider returned {status}"),
            }),
            status => Err(MeetingError::Unavailable {
                reason: format!("provider returned {status}"),
            }),
        }
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError> {
        let response = self
            .client
            .delete(format!("{}/meetings/{meeting_id}", self.base_url))
            .send()
            .await
            .map_err(|e| Self::unavailable(&e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(MeetingError::NotFound {
                meeting_id: meeting_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            status if status.is_client_error() => Err(MeetingError::Rejected {
                reason: format!("provider returned {status}"),
            }),
            status => Err(MeetingError::Unavailable {
                reason: format!("provider returned {status}"),
            }),
        }
    }
}
