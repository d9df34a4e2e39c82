// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{test_event, MemoryLogger, RecordingActor};
use serde_json::Map;
use sy_core::{SystemClock, Target, Trigger};

fn route() -> Route {
    Route {
        name: "r1".to_string(),
        when: Trigger {
            source: "gh".to_string(),
            events: vec!["resource.changed".into()],
            filter: Map::new(),
        },
        transforms: Vec::new(),
        then: Target { actor: "agent".to_string(), config: Map::new() },
        prompt_text: Some("look at this".to_string()),
    }
}

struct Rig {
    fanout: LoggerFanout,
    logger: std::sync::Arc<MemoryLogger>,
}

impl Rig {
    fn new() -> Self {
        let fanout = LoggerFanout::new();
        let logger = MemoryLogger::new();
        fanout.attach("eng", vec![logger.clone()]);
        Self { fanout, logger }
    }
}

#[tokio::test]
async fn successful_delivery_emits_attempt_then_success() {
    let rig = Rig::new();
    let actor = RecordingActor::new();
    let event = test_event("gh", "resource.changed");

    let result = deliver_event(
        &event,
        &route(),
        actor.clone(),
        Duration::from_secs(5),
        &rig.fanout,
        &SystemClock,
        "eng",
    )
    .await;

    assert_eq!(result, DeliveryResult::Delivered);
    assert_eq!(actor.delivery_count(), 1);
    assert_eq!(actor.delivered()[0].id, event.id);
    assert_eq!(actor.prompts(), vec![Some("look at this".to_string())]);
    assert_eq!(rig.logger.phases(), vec![Phase::DeliverAttempt, Phase::DeliverSuccess]);

    let records = rig.logger.records();
    assert_eq!(records[1].target.as_deref(), Some("agent"));
    assert!(records[1].duration_ms.is_some());
}

#[tokio::test]
async fn rejection_is_terminal_failure_phase() {
    let rig = Rig::new();
    let actor = RecordingActor::rejecting("not my event");

    let result = deliver_event(
        &test_event("gh", "resource.changed"),
        &route(),
        actor,
        Duration::from_secs(5),
        &rig.fanout,
        &SystemClock,
        "eng",
    )
    .await;

    assert_eq!(result, DeliveryResult::Rejected("not my event".to_string()));
    assert_eq!(rig.logger.phases(), vec![Phase::DeliverAttempt, Phase::DeliverFailure]);
    let records = rig.logger.records();
    assert!(records[1].error.as_deref().is_some_and(|e| e.starts_with("rejected:")));
}

#[tokio::test]
async fn actor_error_is_failed() {
    let rig = Rig::new();
    let actor = RecordingActor::failing("connection refused");

    let result = deliver_event(
        &test_event("gh", "resource.changed"),
        &route(),
        actor,
        Duration::from_secs(5),
        &rig.fanout,
        &SystemClock,
        "eng",
    )
    .await;

    assert!(matches!(result, DeliveryResult::Failed(message) if message.contains("connection refused")));
    assert!(rig.logger.has_phase(Phase::DeliverFailure));
}

#[tokio::test]
async fn hung_actor_times_out_as_failed() {
    let rig = Rig::new();
    let actor = RecordingActor::hanging();

    let result = deliver_event(
        &test_event("gh", "resource.changed"),
        &route(),
        actor,
        Duration::from_millis(20),
        &rig.fanout,
        &SystemClock,
        "eng",
    )
    .await;

    assert!(matches!(result, DeliveryResult::Failed(message) if message.contains("timed out")));
    assert_eq!(rig.logger.phases(), vec![Phase::DeliverAttempt, Phase::DeliverFailure]);
}
