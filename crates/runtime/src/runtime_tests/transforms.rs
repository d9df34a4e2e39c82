// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transform pipeline scenarios, including the three error policies.

use super::*;
use sy_core::{OnError, Phase};

fn boom_module(on_error: OnError) -> TestModule {
    TestModule::new("eng")
        .source("gh")
        .actor("agent")
        .transform(
            TransformDef::package("boom").with_on_error(on_error),
            TestTransform::failing("kaboom"),
        )
        .route("r1", "gh", &["boom"], "agent")
}

#[tokio::test]
async fn dropping_transform_stops_delivery() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng")
        .source("gh")
        .actor("agent")
        .transform(
            TransformDef::package("filter"),
            TestTransform::dropping_if(|e| e.payload.get("bot") == Some(&serde_json::json!(true))),
        )
        .route("r1", "gh", &["filter"], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let mut bot = test_event("gh", "resource.changed");
    bot.payload.insert("bot".to_string(), serde_json::json!(true));
    rig.runtime.inject("eng", bot.clone()).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 0);
    let phases: Vec<Phase> = module.logger.records_for(&bot.id).iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::SourceEmit, Phase::RouteMatch, Phase::TransformStart, Phase::TransformDrop]
    );
    assert!(!module.logger.has_phase(Phase::DeliverAttempt));

    // A human event passes the same filter and is delivered.
    let mut human = test_event("gh", "resource.changed");
    human.payload.insert("bot".to_string(), serde_json::json!(false));
    rig.runtime.inject("eng", human).await.unwrap();
    rig.settle().await;
    assert_eq!(module.actors["agent"].delivery_count(), 1);
}

#[tokio::test]
async fn error_policy_pass_still_delivers() {
    let rig = TestRig::new();
    let mut errors = rig.runtime.take_errors().unwrap();
    rig.runtime.start().await;

    let module = boom_module(OnError::Pass);
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 1);
    assert!(module.logger.has_phase(Phase::TransformError));
    assert!(module.logger.has_phase(Phase::DeliverSuccess));
    // Pass policy is not fatal: nothing on the error channel.
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn error_policy_drop_suppresses_delivery() {
    let rig = TestRig::new();
    let mut errors = rig.runtime.take_errors().unwrap();
    rig.runtime.start().await;

    let module = boom_module(OnError::Drop);
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 0);
    assert!(module.logger.has_phase(Phase::TransformErrorDrop));
    assert!(!module.logger.has_phase(Phase::DeliverAttempt));
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn error_policy_halt_is_fatal_on_the_error_channel() {
    let rig = TestRig::new();
    let mut errors = rig.runtime.take_errors().unwrap();
    rig.runtime.start().await;

    let module = boom_module(OnError::Halt);
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 0);
    assert!(module.logger.has_phase(Phase::TransformErrorHalt));

    let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(err, RuntimeError::TransformHalt { route, .. } if route == "r1"));
}

#[tokio::test]
async fn route_override_beats_definition_policy() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    // Definition says halt; route says pass. The event must deliver.
    let mut module = boom_module(OnError::Halt);
    module.config.routes[0].transforms[0].on_error = Some(OnError::Pass);
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 1);
    assert!(module.logger.has_phase(Phase::TransformError));
    assert!(!module.logger.has_phase(Phase::TransformErrorHalt));
}

#[tokio::test]
async fn transforms_chain_and_the_successor_is_delivered() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng")
        .source("gh")
        .actor("agent")
        .transform(
            TransformDef::package("enrich"),
            TestTransform::mapping(|mut e| {
                e.payload.insert("enriched".to_string(), serde_json::json!(true));
                e
            }),
        )
        .route("r1", "gh", &["enrich"], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let event = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;

    let delivered = module.actors["agent"].delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload["enriched"], serde_json::json!(true));
    assert_eq!(delivered[0].trace_id, event.trace_id);
}

#[tokio::test]
async fn script_transform_drop_and_pass_end_to_end() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    // Drops events whose payload carries "skip": exit 1; passes others
    // through unchanged.
    let script = r#"body=$(cat); case "$body" in *'"skip"'*) exit 1;; *) printf '%s' "$body";; esac"#;
    let module = TestModule::new("eng")
        .source("gh")
        .actor("agent")
        .script_transform(TransformDef::script("sieve", script))
        .route("r1", "gh", &["sieve"], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let mut skipped = test_event("gh", "resource.changed");
    skipped.payload.insert("skip".to_string(), serde_json::json!(1));
    rig.runtime.inject("eng", skipped.clone()).await.unwrap();

    let kept = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", kept.clone()).await.unwrap();
    rig.settle().await;

    let delivered = module.actors["agent"].delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, kept.id);
    assert!(module.logger.has_phase(Phase::TransformDrop));
}

#[tokio::test]
async fn per_route_serialization_keeps_event_order() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let events: Vec<_> = (0..10).map(|_| test_event("gh", "resource.changed")).collect();
    for event in &events {
        rig.runtime.inject("eng", event.clone()).await.unwrap();
    }
    rig.settle().await;

    let delivered_ids: Vec<_> =
        module.actors["agent"].delivered().iter().map(|e| e.id).collect();
    let injected_ids: Vec<_> = events.iter().map(|e| e.id).collect();
    assert_eq!(delivered_ids, injected_ids);
}
