// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property: the final archive state is independent of duplicate and
//! reordered event deliveries, as long as processing runs to completion.

use ccm_core::{ModificationType, Record, WorkflowRecord, decode_record, encode_record};
use ccm_email::Topic;
use ccm_mock::{MockEmailGateway, MockMeetingProvider, approved_change, fixture_config, trigger_event};
use ccm_processor::{ExecutionSummary, TriggerProcessor};
use ccm_store::{MemoryStore, ObjectStore, archive_key, trigger_key};
use proptest::prelude::*;
use std::sync::Arc;

/// A delivery schedule: each entry is an index into ["hts", "cds"].
fn delivery_schedule() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0usize..2, 2..10).prop_filter(
        "every customer delivered at least once",
        |schedule| schedule.contains(&0) && schedule.contains(&1),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn final_state_is_delivery_order_independent(schedule in delivery_schedule()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let customers = ["hts", "cds"];
            let store = Arc::new(MemoryStore::new());
            let gateway = Arc::new(MockEmailGateway::new());
            gateway.set_subscribers("hts", Topic::Calendar, &["a@hts.example"]);
            gateway.set_subscribers("cds", Topic::Calendar, &["b@cds.example"]);
            gateway.set_subscribers("hts", Topic::Announce, &["all@hts.example"]);
            let provider = Arc::new(MockMeetingProvider::new());
            let processor = TriggerProcessor::new(
                Arc::new(fixture_config()),
                store.clone(),
                gateway.clone(),
                provider.clone(),
            );

            let record = Record::Change(approved_change());
            store
                .put(&archive_key("CHANGE-2025-001"), encode_record(&record).unwrap())
                .await
                .unwrap();
            for code in customers {
                store
                    .put(&trigger_key(code, "CHANGE-2025-001"), b"{}".to_vec())
                    .await
                    .unwrap();
            }

            let mut summary = ExecutionSummary::new();
            for index in schedule {
                processor
                    .process_message(
                        &trigger_event(customers[index], "CHANGE-2025-001"),
                        &mut summary,
                    )
                    .await;
            }

            let (body, _) = store.get(&archive_key("CHANGE-2025-001")).await.unwrap();
            let archived = decode_record(&body).unwrap();

            // Exactly one processed entry per customer, however many
            // duplicates were delivered.
            for code in customers {
                let count = archived
                    .modifications()
                    .iter()
                    .filter(|e| {
                        e.modification_type == ModificationType::Processed
                            && e.customer_code.as_deref() == Some(code)
                    })
                    .count();
                prop_assert_eq!(count, 1, "customer {}", code);
            }

            // Exactly one meeting, live, mirrored at the top level.
            let scheduled = archived
                .modifications()
                .iter()
                .filter(|e| e.modification_type == ModificationType::MeetingScheduled)
                .count();
            prop_assert_eq!(scheduled, 1);
            prop_assert!(archived.meeting_id().is_some());
            prop_assert_eq!(provider.live_meetings().len(), 1);

            // Both triggers cleared.
            for code in customers {
                prop_assert_eq!(
                    store
                        .head(&trigger_key(code, "CHANGE-2025-001"))
                        .await
                        .unwrap(),
                    None
                );
            }

            // The record passes validation in its settled state.
            prop_assert!(ccm_core::validate_record(&archived).is_empty());
            Ok(())
        })?;
    }
}
