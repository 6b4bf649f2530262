// SPDX-License-Identifier: MIT OR Apache-2.0
//! The dispatcher: subscribers → filter → render → send.

use crate::filter::apply_allow_list;
use crate::render::{TemplateKind, render};
use crate::{EmailGateway, Topic};
use ccm_config::CustomerDescriptor;
use ccm_core::Record;
use ccm_error::Fault;
use tracing::warn;

/// Counters from one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Recipients the message went to.
    pub emails_sent: u64,
    /// Subscribers before restriction filtering.
    pub emails_before_filter: u64,
    /// Subscribers dropped by the allow-list.
    pub emails_filtered: u64,
}

/// Sends one rendered notice to a customer's topic subscribers.
pub struct EmailDispatcher<G> {
    gateway: G,
}

impl<G: EmailGateway> EmailDispatcher<G> {
    /// Dispatcher over the given gateway.
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// The gateway, for callers that need raw subscriber access.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Fetch subscribers, filter, render, and send.
    ///
    /// An empty (possibly fully filtered) subscriber list is a no-op
    /// success with `emails_sent = 0`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's fault when the subscriber fetch or the send
    /// fails.
    pub async fn dispatch(
        &self,
        customer: &CustomerDescriptor,
        topic: Topic,
        kind: TemplateKind,
        record: &Record,
    ) -> Result<DispatchOutcome, Fault> {
        let subscribers = self
            .gateway
            .list_subscribers(&customer.customer_code, topic)
            .await
            .map_err(Fault::from)?;

        let filtered = apply_allow_list(subscribers, customer.restricted_recipients.as_deref());
        let outcome = DispatchOutcome {
            emails_sent: filtered.after as u64,
            emails_before_filter: filtered.before as u64,
            emails_filtered: filtered.filtered as u64,
        };

        if filtered.recipients.is_empty() {
            warn!(
                customer_code = customer.customer_code.as_str(),
                topic = topic.name(),
                before = filtered.before,
                "no recipients after filtering; nothing to send"
            );
            return Ok(outcome);
        }

        let rendered = render(kind, record);
        self.gateway
            .send(
                &customer.customer_code,
                topic,
                &filtered.recipients,
                &rendered.subject,
                &rendered.html_body,
            )
            .await
            .map_err(Fault::from)?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmailError;
    use async_trait::async_trait;
    use ccm_core::{
        Change, ModificationEntry, ModificationType, ObjectType, RecordId, Schedule, Status,
    };
    use ccm_error::FaultKind;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedGateway {
        subscribers: HashMap<&'static str, Vec<String>>,
        sent: Mutex<Vec<(String, String, Vec<String>, String)>>,
        fail_send: bool,
    }

    #[async_trait]
    impl EmailGateway for ScriptedGateway {
        async fn list_subscribers(
            &self,
            _customer_code: &str,
            topic: Topic,
        ) -> Result<Vec<String>, EmailError> {
            Ok(self
                .subscribers
                .get(topic.name())
                .cloned()
                .unwrap_or_default())
        }

        async fn send(
            &self,
            customer_code: &str,
            topic: Topic,
            recipients: &[String],
            subject: &str,
            _html_body: &str,
        ) -> Result<(), EmailError> {
            if self.fail_send {
                return Err(EmailError::Transient {
                    customer_code: customer_code.to_string(),
                    reason: "injected".to_string(),
                });
            }
            self.sent.lock().unwrap().push((
                customer_code.to_string(),
                topic.name().to_string(),
                recipients.to_vec(),
                subject.to_string(),
            ));
            Ok(())
        }
    }

    fn customer(restricted: Option<Vec<&str>>) -> CustomerDescriptor {
        CustomerDescriptor {
            customer_code: "hts".to_string(),
            display_name: "HTS".to_string(),
            region: "eu-central-1".to_string(),
            email_role_principal: "arn:aws:iam::1:role/email".to_string(),
            queue_identifier: "q".to_string(),
            restricted_recipients: restricted
                .map(|list| list.into_iter().map(str::to_string).collect()),
        }
    }

    fn record() -> Record {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Record::Change(Change {
            change_id: RecordId::parse("CHANGE-2025-001").unwrap(),
            object_type: ObjectType::Change,
            title: "t".into(),
            description: "d".into(),
            implementation_plan: "p".into(),
            schedule: Schedule {
                start_time: t0,
                end_time: t0 + chrono::Duration::hours(4),
                timezone: "UTC".into(),
            },
            affected_customers: ["hts".to_string()].into(),
            status: Status::Submitted,
            created_by: "op".into(),
            created_at: t0,
            meeting_required: false,
            meeting_id: None,
            join_url: None,
            modifications: vec![ModificationEntry::new(ModificationType::Created, "op", t0)],
        })
    }

    #[tokio::test]
    async fn dispatches_to_all_subscribers() {
        let gateway = ScriptedGateway {
            subscribers: [(
                "approval",
                vec!["a@x.example".to_string(), "b@x.example".to_string()],
            )]
            .into(),
            ..Default::default()
        };
        let dispatcher = EmailDispatcher::new(gateway);

        let outcome = dispatcher
            .dispatch(
                &customer(None),
                Topic::Approval,
                TemplateKind::ApprovalRequest,
                &record(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.emails_sent, 2);
        assert_eq!(outcome.emails_filtered, 0);
        let sent = dispatcher.gateway().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "approval");
        assert_eq!(sent[0].2.len(), 2);
    }

    #[tokio::test]
    async fn allow_list_filters_before_sending() {
        let gateway = ScriptedGateway {
            subscribers: [(
                "announce",
                vec!["ops@x.example".to_string(), "dev@x.example".to_string()],
            )]
            .into(),
            ..Default::default()
        };
        let dispatcher = EmailDispatcher::new(gateway);

        let outcome = dispatcher
            .dispatch(
                &customer(Some(vec!["ops@x.example"])),
                Topic::Announce,
                TemplateKind::ApprovedNotice,
                &record(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.emails_before_filter, 2);
        assert_eq!(outcome.emails_sent, 1);
        assert_eq!(outcome.emails_filtered, 1);
        let sent = dispatcher.gateway().sent.lock().unwrap();
        assert_eq!(sent[0].2, vec!["ops@x.example".to_string()]);
    }

    #[tokio::test]
    async fn empty_topic_is_a_successful_no_op() {
        let dispatcher = EmailDispatcher::new(ScriptedGateway::default());
        let outcome = dispatcher
            .dispatch(
                &customer(None),
                Topic::Announce,
                TemplateKind::ApprovedNotice,
                &record(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.emails_sent, 0);
        assert!(dispatcher.gateway().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failures_surface_as_faults() {
        let gateway = ScriptedGateway {
            subscribers: [("approval", vec!["a@x.example".to_string()])].into(),
            fail_send: true,
            ..Default::default()
        };
        let dispatcher = EmailDispatcher::new(gateway);

        let fault = dispatcher
            .dispatch(
                &customer(None),
                Topic::Approval,
                TemplateKind::ApprovalRequest,
                &record(),
            )
            .await
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Transient);
    }
}
