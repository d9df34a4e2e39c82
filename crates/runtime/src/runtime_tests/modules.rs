// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module lifecycle scenarios: singleton enforcement, reload, shutdown
//! completeness, status reporting.

use super::*;
use crate::module::ModuleState;
use sy_core::ConfigError;

#[tokio::test]
async fn second_load_of_same_name_fails() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let first = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(first.config.clone(), first.connectors()).await.unwrap();

    let second = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    let err = rig.runtime.load_module(second.config.clone(), second.connectors()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleAlreadyLoaded(name) if name == "eng"));

    assert_eq!(rig.runtime.module_summaries().len(), 1);
}

#[tokio::test]
async fn invalid_config_is_rejected_without_side_effects() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let mut module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    module.config.routes[0].then.actor = "ghost".to_string();

    let err = rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Config(ConfigError::UnknownReference { .. })));
    assert!(rig.runtime.module_summaries().is_empty());
    // No connector was touched.
    assert_eq!(module.sources["gh"].init_count(), 0);
}

#[tokio::test]
async fn init_failure_leaves_nothing_registered() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    module.sources["gh"].fail_init("missing token");

    let err = rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleInit { .. }));
    assert!(rig.runtime.module_summaries().is_empty());
    assert!(rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.is_err());
}

#[tokio::test]
async fn unload_shuts_connectors_down_and_frees_the_name() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();
    rig.runtime.unload_module("eng").await.unwrap();

    assert_eq!(module.sources["gh"].shutdown_count(), 1);
    assert_eq!(module.actors["agent"].shutdown_count(), 1);
    assert_eq!(module.logger.shutdown_count(), 1);
    assert!(rig.runtime.module_summaries().is_empty());

    // The name is free again.
    let again = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(again.config.clone(), again.connectors()).await.unwrap();
}

#[tokio::test]
async fn unload_of_unknown_module_fails() {
    let rig = TestRig::new();
    rig.runtime.start().await;
    let err = rig.runtime.unload_module("ghost").await.unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleNotFound(_)));
}

#[tokio::test]
async fn reload_swaps_instances_and_keeps_other_modules_polling() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    // A second module polling fast, to observe during the reload.
    let other = TestModule::new("ops").polling_source("ci", "20ms").actor("agent");
    rig.runtime.load_module(other.config.clone(), other.connectors()).await.unwrap();

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let polls_before = other.sources["ci"].poll_count();

    let replacement = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    let status = rig
        .runtime
        .reload_module("eng", Some(replacement.config.clone()), replacement.connectors())
        .await
        .unwrap();
    assert_eq!(status.state, ModuleState::Active);

    // Old instance fully shut down, exactly once.
    assert_eq!(module.sources["gh"].shutdown_count(), 1);
    assert_eq!(module.actors["agent"].shutdown_count(), 1);

    // The registry kept exactly one entry for the name throughout.
    let summaries = rig.runtime.module_summaries();
    assert_eq!(summaries.iter().filter(|s| s.name == "eng").count(), 1);

    // The replacement serves traffic.
    let event = test_event("gh", "resource.changed");
    rig.runtime.inject("eng", event.clone()).await.unwrap();
    rig.settle().await;
    assert_eq!(replacement.actors["agent"].delivery_count(), 1);
    assert_eq!(module.actors["agent"].delivery_count(), 0);

    // The other module kept polling across the reload.
    wait_until(|| other.sources["ci"].poll_count() > polls_before).await;

    rig.runtime.unload_module("ops").await.unwrap();
}

#[tokio::test]
async fn reload_with_bad_config_keeps_the_old_module_running() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    let mut bad = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    bad.config.routes[0].then.actor = "ghost".to_string();
    let err =
        rig.runtime.reload_module("eng", Some(bad.config.clone()), bad.connectors()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)));

    // Old module untouched and still delivering.
    assert_eq!(module.sources["gh"].shutdown_count(), 0);
    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;
    assert_eq!(module.actors["agent"].delivery_count(), 1);
}

#[tokio::test]
async fn reload_of_unknown_module_fails() {
    let rig = TestRig::new();
    rig.runtime.start().await;
    let module = TestModule::new("eng").source("gh").actor("agent");
    let err = rig
        .runtime
        .reload_module("eng", Some(module.config.clone()), module.connectors())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleNotFound(_)));
}

#[tokio::test]
async fn stop_unloads_every_module_and_shuts_every_connector_down_once() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let eng = TestModule::new("eng")
        .source("gh")
        .actor("agent")
        .transform(TransformDef::package("filter"), TestTransform::passthrough())
        .route("r1", "gh", &["filter"], "agent");
    let ops = TestModule::new("ops").polling_source("ci", "20ms").actor("pager");
    rig.runtime.load_module(eng.config.clone(), eng.connectors()).await.unwrap();
    rig.runtime.load_module(ops.config.clone(), ops.connectors()).await.unwrap();

    rig.runtime.stop().await;

    assert_eq!(eng.sources["gh"].shutdown_count(), 1);
    assert_eq!(eng.actors["agent"].shutdown_count(), 1);
    assert_eq!(eng.transforms["filter"].shutdown_count(), 1);
    assert_eq!(eng.logger.shutdown_count(), 1);
    assert_eq!(ops.sources["ci"].shutdown_count(), 1);
    assert_eq!(ops.actors["pager"].shutdown_count(), 1);
    assert!(rig.runtime.module_summaries().is_empty());
    assert!(rig.runtime.is_stopping());

    // Stop is idempotent.
    rig.runtime.stop().await;
    assert_eq!(eng.sources["gh"].shutdown_count(), 1);
}

#[tokio::test]
async fn status_counts_events_and_deliveries() {
    let rig = TestRig::new();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    let status = rig.runtime.status();
    assert_eq!(status.pid, std::process::id());
    assert_eq!(status.pending_events, 0);
    assert!(!status.durable);
    assert_eq!(status.modules.len(), 1);
    assert_eq!(status.modules[0].events_routed, 2);
    assert_eq!(status.modules[0].deliveries, 2);
    assert_eq!(status.modules[0].sources.len(), 1);
}
