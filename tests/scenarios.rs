// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios over the full stack: in-memory store and queue,
//! mock email services and meeting provider, real processor.

use ccm_core::{
    Command, ModificationType, Record, SideEffect, Status, WorkflowRecord, decode_record,
    encode_record, modlog, transition,
};
use ccm_email::Topic;
use ccm_mock::{
    MemoryQueue, MockEmailGateway, MockMeetingProvider, approved_change, fixture_config,
    submitted_change, trigger_event,
};
use ccm_processor::{CommandExecutor, ExecutionSummary, TriggerEvent, TriggerProcessor, drive_once};
use ccm_store::{MemoryStore, ObjectStore, archive_key, trigger_key};
use std::sync::Arc;

struct World {
    store: Arc<MemoryStore>,
    gateway: Arc<MockEmailGateway>,
    provider: Arc<MockMeetingProvider>,
    queue: MemoryQueue,
    processor: TriggerProcessor,
}

fn world() -> World {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockEmailGateway::new());
    let provider = Arc::new(MockMeetingProvider::new());
    let processor = TriggerProcessor::new(
        Arc::new(fixture_config()),
        store.clone(),
        gateway.clone(),
        provider.clone(),
    );
    World {
        store,
        gateway,
        provider,
        queue: MemoryQueue::new(),
        processor,
    }
}

impl World {
    async fn seed(&self, record: &Record, customers: &[&str]) {
        let id = record.id().as_str();
        self.store
            .put(&archive_key(id), encode_record(record).unwrap())
            .await
            .unwrap();
        for code in customers {
            self.store
                .put(&trigger_key(code, id), encode_record(record).unwrap())
                .await
                .unwrap();
            self.queue.push(trigger_event(code, id));
        }
    }

    async fn archived(&self, record_id: &str) -> Record {
        let (body, _) = self.store.get(&archive_key(record_id)).await.unwrap();
        decode_record(&body).unwrap()
    }

    fn subscribe_calendars(&self) {
        self.gateway.set_subscribers(
            "hts",
            Topic::Calendar,
            &["Alice@hts.example", "bob@hts.example"],
        );
        self.gateway.set_subscribers(
            "cds",
            Topic::Calendar,
            &["alice@HTS.example", "carol@cds.example"],
        );
    }

    fn subscribe_announce(&self) {
        self.gateway
            .set_subscribers("hts", Topic::Announce, &["all-hts@hts.example"]);
        self.gateway.set_subscribers(
            "cds",
            Topic::Announce,
            &["all-cds@cds.example", "extra@cds.example"],
        );
    }
}

// ── Happy-path fan-out to two customers ─────────────────────────────────

#[tokio::test]
async fn fan_out_reaches_both_customers_with_one_meeting() {
    let world = world();
    world.subscribe_calendars();
    world.subscribe_announce();

    // The approved record fans out the meeting and the approved notices.
    let record = Record::Change(approved_change());
    world.seed(&record, &["hts", "cds"]).await;

    let summary = drive_once(&world.processor, &world.queue, 10).await.unwrap();

    // One meeting, attendees = case-insensitive union of both calendars.
    let archived = world.archived("CHANGE-2025-001").await;
    let scheduled: Vec<_> = archived
        .modifications()
        .iter()
        .filter(|e| e.modification_type == ModificationType::MeetingScheduled)
        .collect();
    assert_eq!(scheduled.len(), 1);
    let metadata = scheduled[0].meeting_metadata.as_ref().unwrap();
    let expected: std::collections::BTreeSet<String> = [
        "alice@hts.example",
        "bob@hts.example",
        "carol@cds.example",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(metadata.attendees, expected);

    // Two processed entries, one per customer.
    assert!(modlog::has_processed(&archived, "hts"));
    assert!(modlog::has_processed(&archived, "cds"));

    // Top-level meeting fields mirror the log entry.
    assert_eq!(archived.meeting_id(), Some(metadata.meeting_id.as_str()));

    // Both triggers gone, queue drained.
    for code in ["hts", "cds"] {
        assert_eq!(
            world
                .store
                .head(&trigger_key(code, "CHANGE-2025-001"))
                .await
                .unwrap(),
            None
        );
    }
    assert!(world.queue.is_empty());

    // Announce emails went to every subscriber of both customers.
    assert_eq!(summary.successful_messages, 2);
    assert_eq!(summary.emails_sent, 3);
    assert_eq!(summary.emails_filtered, 0);
    assert_eq!(world.provider.creates().len(), 1);
}

// ── Duplicate event after completion ────────────────────────────────────

#[tokio::test]
async fn duplicate_event_after_completion_is_a_no_op() {
    let world = world();
    world.subscribe_calendars();
    world.subscribe_announce();
    let record = Record::Change(approved_change());
    world.seed(&record, &["hts", "cds"]).await;
    drive_once(&world.processor, &world.queue, 10).await.unwrap();
    let before = world.archived("CHANGE-2025-001").await;
    let emails_before = world.gateway.sent().len();

    // Redeliver the hts event.
    world.queue.push(trigger_event("hts", "CHANGE-2025-001"));
    let summary = drive_once(&world.processor, &world.queue, 10).await.unwrap();

    assert_eq!(summary.total_messages, 1);
    assert_eq!(summary.successful_messages, 1);
    assert_eq!(summary.emails_sent, 0);
    assert!(world.queue.is_empty());
    assert_eq!(world.archived("CHANGE-2025-001").await, before);
    assert_eq!(world.gateway.sent().len(), emails_before);
}

// ── Concurrent fan-out for both customers ───────────────────────────────

#[tokio::test]
async fn concurrent_customers_serialize_on_the_archive() {
    let world = world();
    world.subscribe_calendars();
    world.subscribe_announce();
    let record = Record::Change(approved_change());
    world.seed(&record, &["hts", "cds"]).await;

    // Process both events concurrently rather than through the queue
    // loop; the conditional archive writes serialize them.
    let mut summary_a = ExecutionSummary::new();
    let mut summary_b = ExecutionSummary::new();
    let event_a = trigger_event("hts", "CHANGE-2025-001");
    let event_b = trigger_event("cds", "CHANGE-2025-001");
    let (a, b) = tokio::join!(
        world.processor.process_message(&event_a, &mut summary_a),
        world.processor.process_message(&event_b, &mut summary_b),
    );
    assert_eq!(a, ccm_processor::Disposition::Ack);
    assert_eq!(b, ccm_processor::Disposition::Ack);

    let archived = world.archived("CHANGE-2025-001").await;
    let processed = archived
        .modifications()
        .iter()
        .filter(|e| e.modification_type == ModificationType::Processed)
        .count();
    assert_eq!(processed, 2);

    // Meeting idempotency: one live meeting no matter who won the race.
    let scheduled = archived
        .modifications()
        .iter()
        .filter(|e| e.modification_type == ModificationType::MeetingScheduled)
        .count();
    assert_eq!(scheduled, 1);
    assert_eq!(world.provider.live_meetings().len(), 1);

    let mut summary = summary_a;
    summary.merge(summary_b);
    assert_eq!(summary.successful_messages, 2);
}

// ── Edit from approved cancels the meeting ──────────────────────────────

#[tokio::test]
async fn edit_from_approved_cancels_meeting_and_reapproves() {
    let world = world();
    world.subscribe_calendars();
    world
        .gateway
        .set_subscribers("hts", Topic::Approval, &["approver@hts.example"]);

    // The approval fan-out runs first, so a meeting is live.
    let record = Record::Change(approved_change());
    world.seed(&record, &["hts", "cds"]).await;
    drive_once(&world.processor, &world.queue, 10).await.unwrap();
    let approved = world.archived("CHANGE-2025-001").await;
    assert!(approved.meeting_id().is_some());
    assert_eq!(world.provider.live_meetings().len(), 1);

    // The engine names the side effects for the operator's edit...
    let decided = transition(&approved, Command::Edit).unwrap();
    assert_eq!(
        decided.side_effects,
        vec![SideEffect::CancelMeeting, SideEffect::SendApprovalRequest]
    );

    // ...and the command executor carries them out against the archive.
    let executor = CommandExecutor::new(
        Arc::new(fixture_config()),
        world.store.clone(),
        world.gateway.clone(),
        world.provider.clone(),
    );
    let updated = executor
        .apply("CHANGE-2025-001", Command::Edit, "operator@example.org")
        .await
        .unwrap()
        .expect("record survives an edit");

    assert!(world.provider.live_meetings().is_empty());
    assert_eq!(updated.status(), Status::Submitted);
    assert_eq!(updated.meeting_id(), None);
    assert!(modlog::latest_of_type(&updated, ModificationType::MeetingCancelled).is_some());

    // The resubmission fans out a fresh approval request.
    world
        .store
        .put(
            &trigger_key("hts", "CHANGE-2025-001"),
            encode_record(&updated).unwrap(),
        )
        .await
        .unwrap();
    world.queue.push(trigger_event("hts", "CHANGE-2025-001"));
    let summary = drive_once(&world.processor, &world.queue, 10).await.unwrap();
    assert_eq!(summary.approval_requests, 1);
    assert_eq!(world.gateway.sent_to(Topic::Approval).len(), 1);
}

// ── European dates are rejected ─────────────────────────────────────────

#[test]
fn european_date_input_is_rejected() {
    let err = ccm_datetime::parse_timestamp("15/01/2025", &ccm_datetime::DateTimeConfig::default())
        .unwrap_err();
    assert_eq!(err.tag(), "INVALID_FORMAT");
}

// ── Backend-generated events are discarded ──────────────────────────────

#[tokio::test]
async fn self_caused_events_are_discarded() {
    let world = world();
    world.queue.push(TriggerEvent {
        bucket: "contact-manager-test".to_string(),
        key: "customers/hts/CHANGE-2025-001".to_string(),
        source_principal: "arn:aws:sts::111111111111:assumed-role/ccm-processor".to_string(),
    });

    let summary = drive_once(&world.processor, &world.queue, 10).await.unwrap();
    assert_eq!(summary.discarded_events, 1);
    assert_eq!(summary.customers_processed, 0);
    assert!(world.gateway.sent().is_empty());
    assert!(world.queue.is_empty());
}

// ── Trigger bodies are never truth ──────────────────────────────────────

#[tokio::test]
async fn trigger_bodies_never_influence_processing() {
    let world = world();
    world
        .gateway
        .set_subscribers("hts", Topic::Approval, &["approver@hts.example"]);

    let record = Record::Change(submitted_change());
    world
        .store
        .put(&archive_key("CHANGE-2025-001"), encode_record(&record).unwrap())
        .await
        .unwrap();
    // The trigger body is garbage; only its existence matters.
    world
        .store
        .put(
            &trigger_key("hts", "CHANGE-2025-001"),
            b"{\"status\": \"cancelled\", \"garbage\": true}".to_vec(),
        )
        .await
        .unwrap();
    world.queue.push(trigger_event("hts", "CHANGE-2025-001"));

    let summary = drive_once(&world.processor, &world.queue, 10).await.unwrap();

    // Processing followed the archive (submitted → approval request),
    // not the trigger body.
    assert_eq!(summary.approval_requests, 1);
    assert_eq!(summary.successful_messages, 1);
    let archived = world.archived("CHANGE-2025-001").await;
    assert_eq!(archived.status(), Status::Submitted);
    assert!(modlog::has_processed(&archived, "hts"));
}
