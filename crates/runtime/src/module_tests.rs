// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{MemoryLogger, RecordingActor, ScriptedSource, TestTransform};
use sy_core::{ActorDef, FakeClock, HealthStatus, LoggerDef, SourceDef, TransformDef};

fn config() -> ModuleConfig {
    let mut config = ModuleConfig::new("eng");
    config.sources.push(SourceDef::new("gh", "tracker").with_interval("5m"));
    config.sources.push(SourceDef::new("ci", "pipeline").with_interval("1m"));
    config.actors.push(ActorDef::new("agent", "waker"));
    config.transforms.push(TransformDef::package("filter"));
    config.loggers.push(LoggerDef {
        name: "mem".to_string(),
        kind: "memory".to_string(),
        config: Default::default(),
    });
    config
}

struct Rig {
    gh: Arc<ScriptedSource>,
    ci: Arc<ScriptedSource>,
    agent: Arc<RecordingActor>,
    filter: Arc<TestTransform>,
    logger: Arc<MemoryLogger>,
}

fn connectors() -> (ResolvedConnectors, Rig) {
    let rig = Rig {
        gh: ScriptedSource::new(),
        ci: ScriptedSource::new(),
        agent: RecordingActor::new(),
        filter: TestTransform::passthrough(),
        logger: MemoryLogger::new(),
    };
    let mut resolved = ResolvedConnectors::default();
    resolved.sources.insert("gh".to_string(), rig.gh.clone());
    resolved.sources.insert("ci".to_string(), rig.ci.clone());
    resolved.actors.insert("agent".to_string(), rig.agent.clone());
    resolved.transforms.insert("filter".to_string(), rig.filter.clone());
    resolved.loggers.insert("mem".to_string(), rig.logger.clone());
    (resolved, rig)
}

#[tokio::test]
async fn lifecycle_walks_loading_active_unloading_removed() {
    let (resolved, _rig) = connectors();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);

    assert_eq!(instance.state(), ModuleState::Loading);
    instance.initialize().await.unwrap();

    let clock = FakeClock::new();
    instance.activate(&clock);
    assert_eq!(instance.state(), ModuleState::Active);

    instance.deactivate();
    assert_eq!(instance.state(), ModuleState::Unloading);
    assert!(instance.cancel_token().is_cancelled());

    instance.shutdown().await;
    assert_eq!(instance.state(), ModuleState::Removed);
}

#[tokio::test]
async fn initialize_touches_every_connector() {
    let (resolved, rig) = connectors();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);

    instance.initialize().await.unwrap();

    assert_eq!(rig.gh.init_count(), 1);
    assert_eq!(rig.ci.init_count(), 1);
    assert_eq!(rig.agent.init_count(), 1);
}

#[tokio::test]
async fn init_failure_aborts_the_load() {
    let (resolved, rig) = connectors();
    rig.gh.fail_init("missing token");
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);

    let err = instance.initialize().await.unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleInit { .. }));
    assert!(err.to_string().contains("missing token"));
}

#[tokio::test]
async fn missing_resolved_connector_fails_init() {
    let (mut resolved, _rig) = connectors();
    resolved.actors.clear();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);

    let err = instance.initialize().await.unwrap_err();
    assert!(err.to_string().contains("no connector resolved"));
}

#[tokio::test]
async fn shutdown_visits_every_connector_exactly_once() {
    let (resolved, rig) = connectors();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);
    instance.initialize().await.unwrap();

    instance.shutdown().await;
    // Second call is a no-op: Removed state guards re-entry.
    instance.shutdown().await;

    assert_eq!(rig.gh.shutdown_count(), 1);
    assert_eq!(rig.ci.shutdown_count(), 1);
    assert_eq!(rig.agent.shutdown_count(), 1);
    assert_eq!(rig.filter.shutdown_count(), 1);
    assert_eq!(rig.logger.shutdown_count(), 1);
    assert_eq!(rig.logger.flush_count(), 1);
}

#[tokio::test]
async fn health_records_exist_for_every_declared_source() {
    let (resolved, _rig) = connectors();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);

    // Present before initialize, per the instantiation invariant.
    assert!(instance.health("gh").is_some());
    assert!(instance.health("ci").is_some());
    assert!(instance.health("absent").is_none());

    let snapshot = instance.health_snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().all(|(_, h)| h.status == HealthStatus::Healthy));
}

#[tokio::test]
async fn status_reflects_state_uptime_and_sources() {
    let (resolved, _rig) = connectors();
    let cancel = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &cancel);
    instance.initialize().await.unwrap();

    let clock = FakeClock::new();
    instance.activate(&clock);
    clock.advance(std::time::Duration::from_secs(90));

    let status = instance.status(clock.utc_now());
    assert_eq!(status.name, "eng");
    assert_eq!(status.state, ModuleState::Active);
    assert_eq!(status.uptime_ms, 90_000);
    assert_eq!(status.sources.len(), 2);

    let summary = instance.summary();
    assert_eq!(summary.sources, 2);
    assert_eq!(summary.state, ModuleState::Active);
}

#[tokio::test]
async fn module_cancel_derives_from_parent() {
    let (resolved, _rig) = connectors();
    let parent = CancellationToken::new();
    let instance = ModuleInstance::new(config(), resolved, &parent);

    parent.cancel();
    assert!(instance.cancel_token().is_cancelled());
}
