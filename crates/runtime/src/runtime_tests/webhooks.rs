// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook ingress through the runtime.

use super::*;
use crate::connector::WebhookRequest;
use sy_core::Phase;

fn request() -> WebhookRequest {
    WebhookRequest {
        body: br#"{"action":"opened"}"#.to_vec(),
        content_type: Some("application/json".to_string()),
    }
}

#[tokio::test]
async fn webhook_events_are_injected_for_the_owning_module() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let event = test_event("hooks", "resource.changed");
    let module = TestModule::new("eng")
        .webhook_source("hooks", vec![event.clone()])
        .actor("agent")
        .route("r1", "hooks", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let response = rig.runtime.handle_webhook("hooks", request()).await.unwrap();
    assert_eq!(response.status, 200);
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 1);
    assert_eq!(module.actors["agent"].delivered()[0].id, event.id);
    assert!(module.logger.has_phase(Phase::SourceEmit));
    assert!(module.logger.has_phase(Phase::DeliverSuccess));
}

#[tokio::test]
async fn unknown_webhook_source_is_reported_as_such() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let err = rig.runtime.handle_webhook("ghost", request()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::WebhookUnknownSource(_)));
}

#[tokio::test]
async fn webhook_registration_is_removed_on_unload() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").webhook_source("hooks", vec![]).actor("agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();
    assert!(rig.runtime.handle_webhook("hooks", request()).await.is_ok());

    rig.runtime.unload_module("eng").await.unwrap();
    let err = rig.runtime.handle_webhook("hooks", request()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::WebhookUnknownSource(_)));
}

#[tokio::test]
async fn conflicting_webhook_source_id_rolls_the_load_back() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let first = TestModule::new("eng").webhook_source("hooks", vec![]).actor("agent");
    rig.runtime.load_module(first.config.clone(), first.connectors()).await.unwrap();

    let second = TestModule::new("ops").webhook_source("hooks", vec![]).actor("agent");
    let err = rig.runtime.load_module(second.config.clone(), second.connectors()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::WebhookConflict(_)));

    // Rollback: the loser is gone, its connectors shut down, the winner's
    // registration still serves.
    assert_eq!(rig.runtime.module_summaries().len(), 1);
    assert_eq!(second.sources["hooks"].shutdown_count(), 1);
    assert!(rig.runtime.handle_webhook("hooks", request()).await.is_ok());
}

#[tokio::test]
async fn webhook_source_errors_do_not_open_any_circuit() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    // Webhook-only source with no scripted webhook response: handler errors.
    let module = TestModule::new("eng").source("gh").actor("agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    // Not registered for webhooks at all.
    let err = rig.runtime.handle_webhook("gh", request()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::WebhookUnknownSource(_)));

    let status = rig.runtime.module_status("eng").unwrap();
    assert!(status.sources.iter().all(|s| !s.health.circuit_open));
}
