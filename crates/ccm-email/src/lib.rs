// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-email
//!
//! Email dispatch through per-customer email services.
//!
//! The topic catalog is the stable surface: every customer's service
//! maps the same topic names onto its own subscriber lists. Rendering
//! is pure; filtering applies a customer's allow-list with counters;
//! the dispatcher ties the three together behind brokered credentials.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The dispatcher tying gateway, filter, and renderer together.
pub mod dispatch;
/// Recipient restriction and email normalization.
pub mod filter;
/// HTTP gateway to a customer's email service.
pub mod http;
/// Pure template rendering.
pub mod render;

pub use dispatch::{DispatchOutcome, EmailDispatcher};
pub use filter::{FilterOutcome, apply_allow_list, normalize_email};
pub use http::HttpEmailGateway;
pub use render::{RenderedEmail, TemplateKind, render};

use async_trait::async_trait;
use ccm_core::AnnouncementType;
use ccm_error::{Fault, FaultKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Topic catalog
// ---------------------------------------------------------------------------

/// Stable topic names shared by every customer's email service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Request-for-approval notices.
    Approval,
    /// Approved-change notices.
    Announce,
    /// Subscribers that become meeting attendees.
    Calendar,
    /// Cloud Innovation Center announcements.
    Cic,
    /// FinOps announcements.
    Finops,
    /// InnerSource announcements.
    Innersource,
    /// General announcements.
    General,
}

impl Topic {
    /// The catalog name as customer services know it.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Announce => "announce",
            Self::Calendar => "calendar",
            Self::Cic => "cic",
            Self::Finops => "finops",
            Self::Innersource => "innersource",
            Self::General => "general",
        }
    }

    /// The announcement-type-specific topic.
    #[must_use]
    pub fn for_announcement(announcement_type: AnnouncementType) -> Self {
        match announcement_type {
            AnnouncementType::Cic => Self::Cic,
            AnnouncementType::Finops => Self::Finops,
            AnnouncementType::Innersource => Self::Innersource,
            AnnouncementType::General => Self::General,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures talking to a customer's email service.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Credentials were rejected (after any refresh the gateway does).
    #[error("email service denied access for {customer_code}")]
    Unauthorized {
        /// The affected customer.
        customer_code: String,
    },

    /// Network failure, throttling, or a 5xx from the service.
    #[error("email service unavailable for {customer_code}: {reason}")]
    Transient {
        /// The affected customer.
        customer_code: String,
        /// What went wrong.
        reason: String,
    },
}

impl From<EmailError> for Fault {
    fn from(err: EmailError) -> Self {
        let kind = match &err {
            EmailError::Unauthorized { .. } => FaultKind::Authorization,
            EmailError::Transient { .. } => FaultKind::Transient,
        };
        Fault::new(kind, err.to_string()).with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Access to every customer's email service, keyed by customer code.
///
/// Implementations resolve credentials per call and hide the
/// refresh-once-on-rejection dance; callers only ever see the final
/// outcome.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    /// The subscriber list of a topic in one customer's service.
    async fn list_subscribers(
        &self,
        customer_code: &str,
        topic: Topic,
    ) -> Result<Vec<String>, EmailError>;

    /// Send one rendered message to explicit recipients via a customer's
    /// service.
    async fn send(
        &self,
        customer_code: &str,
        topic: Topic,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError>;
}

#[async_trait]
impl<G: EmailGateway + ?Sized> EmailGateway for std::sync::Arc<G> {
    async fn list_subscribers(
        &self,
        customer_code: &str,
        topic: Topic,
    ) -> Result<Vec<String>, EmailError> {
        (**self).list_subscribers(customer_code, topic).await
    }

    async fn send(
        &self,
        customer_code: &str,
        topic: Topic,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        (**self)
            .send(customer_code, topic, recipients, subject, html_body)
            .await
    }
}
