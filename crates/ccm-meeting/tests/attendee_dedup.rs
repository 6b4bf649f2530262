// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property: gathered attendee sets never contain two addresses that
//! differ only in case.

use async_trait::async_trait;
use ccm_config::AppConfig;
use ccm_email::{EmailError, EmailGateway, Topic};
use ccm_meeting::MeetingService;
use ccm_meeting::{MeetingError, MeetingProvider, MeetingRequest, ProvisionedMeeting};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

struct MapGateway {
    calendars: HashMap<String, Vec<String>>,
}

#[async_trait]
impl EmailGateway for MapGateway {
    async fn list_subscribers(
        &self,
        customer_code: &str,
        _topic: Topic,
    ) -> Result<Vec<String>, EmailError> {
        Ok(self
            .calendars
            .get(customer_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn send(
        &self,
        _customer_code: &str,
        _topic: Topic,
        _recipients: &[String],
        _subject: &str,
        _html_body: &str,
    ) -> Result<(), EmailError> {
        Ok(())
    }
}

struct NullProvider;

#[async_trait]
impl MeetingProvider for NullProvider {
    async fn create(&self, _request: &MeetingRequest) -> Result<ProvisionedMeeting, MeetingError> {
        Ok(ProvisionedMeeting {
            meeting_id: "M1".to_string(),
            join_url: "https://meet.example/m1".to_string(),
        })
    }

    async fn cancel(&self, _meeting_id: &str) -> Result<(), MeetingError> {
        Ok(())
    }
}

fn config() -> Arc<AppConfig> {
    Arc::new(
        AppConfig::from_toml_str(
            r#"
            bucket = "b"
            processor_principal = "arn:aws:sts::1:assumed-role/ccm-processor"

            [meeting_provider]
            base_url = "https://graph.example.com"
            organizer = "ccoe@example.org"

            [[customers]]
            customer_code = "hts"
            display_name = "HTS"
            region = "eu-central-1"
            email_role_principal = "arn:aws:iam::2:role/email"
            queue_identifier = "q1"

            [[customers]]
            customer_code = "cds"
            display_name = "CDS"
            region = "eu-west-1"
            email_role_principal = "arn:aws:iam::3:role/email"
            queue_identifier = "q2"
            "#,
        )
        .unwrap(),
    )
}

/// Email-ish strings with aggressively mixed case.
fn mixed_case_emails() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z]{1,8}@[a-zA-Z]{1,8}\\.(example|EXAMPLE)", 0..12)
}

proptest! {
    #[test]
    fn gathered_attendees_are_case_unique(hts in mixed_case_emails(), cds in mixed_case_emails()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(async {
            let gateway = MapGateway {
                calendars: [
                    ("hts".to_string(), hts.clone()),
                    ("cds".to_string(), cds.clone()),
                ]
                .into(),
            };
            let service = MeetingService::new(gateway, NullProvider, config());
            let gathering = service
                .gather_attendees(&["hts".to_string(), "cds".to_string()])
                .await;

            let lowered: Vec<String> = gathering
                .attendees
                .iter()
                .map(|a| a.to_ascii_lowercase())
                .collect();
            let mut deduped = lowered.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(lowered.len(), deduped.len());

            // Every source address is represented after normalization.
            for source in hts.iter().chain(cds.iter()) {
                prop_assert!(
                    gathering
                        .attendees
                        .contains(&source.trim().to_ascii_lowercase())
                );
            }
            Ok(())
        })?;
    }
}
