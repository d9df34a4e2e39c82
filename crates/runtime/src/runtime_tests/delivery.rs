// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimum viable delivery and fan-out scenarios.

use super::*;
use sy_core::Phase;

#[tokio::test]
async fn injected_event_reaches_the_actor_with_full_phase_trail() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let event = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;

    let agent = &module.actors["agent"];
    assert_eq!(agent.delivery_count(), 1);
    assert_eq!(agent.delivered()[0].id, event.id);

    let records = module.logger.records_for(&event.id);
    let phases: Vec<Phase> = records.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::SourceEmit, Phase::RouteMatch, Phase::DeliverAttempt, Phase::DeliverSuccess]
    );
    // Trace continuity: every record carries the event's trace id.
    assert!(records.iter().all(|r| r.trace_id == Some(event.trace_id)));
    assert_eq!(records[1].route.as_deref(), Some("r1"));
}

#[tokio::test]
async fn unmatched_event_terminates_with_no_match() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let mut event = test_event("gh", "resource.changed");
    event.kind = "actor.stopped".into();
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 0);
    let phases: Vec<Phase> =
        module.logger.records_for(&event.id).iter().map(|r| r.phase).collect();
    assert_eq!(phases, vec![Phase::SourceEmit, Phase::RouteNoMatch]);
}

#[tokio::test]
async fn two_matching_routes_fan_out_to_both_actors() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng")
        .source("gh")
        .actor("first")
        .actor("second")
        .route("r_a", "gh", &[], "first")
        .route("r_b", "gh", &[], "second");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let event = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;

    let first = &module.actors["first"];
    let second = &module.actors["second"];
    assert_eq!(first.delivery_count(), 1);
    assert_eq!(second.delivery_count(), 1);
    assert_eq!(first.delivered()[0].trace_id, event.trace_id);
    assert_eq!(second.delivered()[0].trace_id, event.trace_id);

    // Two full match → deliver trails in the log.
    assert_eq!(module.logger.count_phase(Phase::RouteMatch), 2);
    assert_eq!(module.logger.count_phase(Phase::DeliverSuccess), 2);
}

#[tokio::test]
async fn failed_delivery_reports_on_the_error_channel() {
    let rig = TestRig::new();
    let mut errors = rig.runtime.take_errors().unwrap();
    rig.runtime.start().await;

    let module = TestModule::new("eng")
        .source("gh")
        .actor_with("agent", RecordingActor::failing("connection refused"))
        .route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let event = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;

    assert!(module.logger.has_phase(Phase::DeliverFailure));
    let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(err, RuntimeError::Delivery { .. }));

    let status = rig.runtime.module_status("eng").unwrap();
    assert_eq!(status.delivery_failures, 1);
    assert_eq!(status.deliveries, 0);
}

#[tokio::test]
async fn rejection_is_terminal_without_error_channel_noise() {
    let rig = TestRig::new();
    let mut errors = rig.runtime.take_errors().unwrap();
    rig.runtime.start().await;

    let module = TestModule::new("eng")
        .source("gh")
        .actor_with("agent", RecordingActor::rejecting("not for me"))
        .route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert!(module.logger.has_phase(Phase::DeliverFailure));
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn prompt_text_rides_along_to_the_actor() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let mut route = Route {
        name: "r1".to_string(),
        when: Trigger {
            source: "gh".to_string(),
            events: vec!["resource.changed".into()],
            filter: Map::new(),
        },
        transforms: Vec::new(),
        then: Target { actor: "agent".to_string(), config: Map::new() },
        prompt_text: None,
    };
    route.prompt_text = Some("triage this issue".to_string());

    let module = TestModule::new("eng").source("gh").actor("agent").route_with(route);
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].prompts(), vec![Some("triage this issue".to_string())]);
}

#[tokio::test]
async fn filtered_route_narrows_fan_out() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let mut bots = Route {
        name: "bots".to_string(),
        when: Trigger {
            source: "gh".to_string(),
            events: vec!["resource.changed".into()],
            filter: Map::new(),
        },
        transforms: Vec::new(),
        then: Target { actor: "bot_agent".to_string(), config: Map::new() },
        prompt_text: None,
    };
    bots.when.filter.insert("payload.bot".to_string(), serde_json::json!(true));

    let module = TestModule::new("eng")
        .source("gh")
        .actor("bot_agent")
        .actor("agent")
        .route_with(bots)
        .route("all", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let mut human = test_event("gh", "resource.changed");
    human.payload.insert("bot".to_string(), serde_json::json!(false));
    rig.runtime.inject("eng", human).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["bot_agent"].delivery_count(), 0);
    assert_eq!(module.actors["agent"].delivery_count(), 1);
}

#[tokio::test]
async fn inject_into_unknown_module_fails() {
    let rig = TestRig::new();
    rig.runtime.start().await;
    let err = rig.runtime.inject("ghost", test_event("gh", "resource.changed")).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleNotFound(_)));
}
