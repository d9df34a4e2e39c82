// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{test_event, ScriptedSource};
use std::time::Duration;
use sy_core::SystemClock;
use tempfile::tempdir;

struct Rig {
    scheduler: Scheduler,
    bus: EventBus,
    checkpoints: CheckpointStore,
    errors: ErrorSink,
    _state_dir: tempfile::TempDir,
}

fn rig() -> Rig {
    let state_dir = tempdir().unwrap();
    let (errors, _rx) = ErrorSink::new();
    Rig {
        scheduler: Scheduler::new(),
        bus: EventBus::new(errors.clone()),
        checkpoints: CheckpointStore::new(state_dir.path()),
        errors,
        _state_dir: state_dir,
    }
}

fn spec(
    rig: &Rig,
    source: Arc<ScriptedSource>,
    interval: Duration,
    policy: CircuitPolicy,
) -> PollSpec<SystemClock> {
    PollSpec {
        module: "eng".to_string(),
        source_name: "gh".to_string(),
        source,
        interval,
        health: Arc::new(Mutex::new(SourceHealth::default())),
        bus: rig.bus.clone(),
        checkpoints: rig.checkpoints.clone(),
        fanout: LoggerFanout::new(),
        errors: rig.errors.clone(),
        policy,
        clock: SystemClock,
        cancel: CancellationToken::new(),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn first_poll_fires_immediately_on_schedule() {
    let rig = rig();
    let source = ScriptedSource::new();

    rig.scheduler.schedule(spec(&rig, source.clone(), Duration::from_secs(3600), CircuitPolicy::default()));

    wait_until(|| source.poll_count() >= 1).await;
    rig.scheduler.unschedule("eng", "gh").await;
}

#[tokio::test]
async fn events_publish_in_order_then_checkpoint_persists() {
    let rig = rig();
    let source = ScriptedSource::new();
    let a = test_event("gh", "resource.changed");
    let b = test_event("gh", "resource.changed");
    source.push_poll(vec![a.clone(), b.clone()], Some("cursor:2"));

    rig.scheduler.schedule(spec(&rig, source.clone(), Duration::from_secs(3600), CircuitPolicy::default()));
    wait_until(|| rig.bus.pending_count() >= 2).await;
    wait_until(|| {
        rig.checkpoints.load("eng", "gh").unwrap().as_deref() == Some("cursor:2")
    })
    .await;

    let ids: Vec<_> = rig.bus.unacked().iter().map(|e| e.event.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);

    rig.scheduler.unschedule("eng", "gh").await;
}

#[tokio::test]
async fn next_poll_resumes_from_stored_checkpoint() {
    let rig = rig();
    let source = ScriptedSource::new();
    source.push_poll(vec![test_event("gh", "resource.changed")], Some("cursor:1"));
    source.push_poll(vec![], Some("cursor:1"));

    rig.scheduler.schedule(spec(&rig, source.clone(), Duration::from_millis(30), CircuitPolicy::default()));
    wait_until(|| source.poll_count() >= 2).await;
    rig.scheduler.unschedule("eng", "gh").await;

    let seen = source.checkpoints_seen();
    assert_eq!(seen[0], None);
    assert_eq!(seen[1].as_deref(), Some("cursor:1"));
}

#[tokio::test]
async fn poll_errors_degrade_then_open_circuit() {
    let rig = rig();
    let source = ScriptedSource::new();
    for _ in 0..3 {
        source.push_poll_error("upstream down");
    }

    let policy = CircuitPolicy { failure_threshold: 3, retry_after: Duration::from_secs(3600) };
    let spec = spec(&rig, source.clone(), Duration::from_millis(20), policy);
    let health = spec.health.clone();

    rig.scheduler.schedule(spec);
    wait_until(|| health.lock().circuit_open).await;

    // Circuit open with a far deadline: the source is not polled again.
    let polls_at_open = source.poll_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(source.poll_count(), polls_at_open);
    assert_eq!(polls_at_open, 3);

    let snapshot = health.lock().clone();
    assert_eq!(snapshot.consecutive_errors, 3);
    assert_eq!(snapshot.last_error.as_deref(), Some("upstream down"));

    rig.scheduler.unschedule("eng", "gh").await;
}

#[tokio::test]
async fn circuit_probe_after_deadline_recovers() {
    let rig = rig();
    let source = ScriptedSource::new();
    source.push_poll_error("down");
    source.push_poll_error("down");
    // Probe succeeds.
    source.push_poll(vec![], None);

    let policy = CircuitPolicy { failure_threshold: 2, retry_after: Duration::from_millis(80) };
    let spec = spec(&rig, source.clone(), Duration::from_millis(20), policy);
    let health = spec.health.clone();

    rig.scheduler.schedule(spec);
    wait_until(|| health.lock().circuit_open).await;
    wait_until(|| !health.lock().circuit_open).await;

    let snapshot = health.lock().clone();
    assert_eq!(snapshot.consecutive_errors, 0);
    assert!(snapshot.last_successful_poll.is_some());

    rig.scheduler.unschedule("eng", "gh").await;
}

#[tokio::test]
async fn failed_probe_reschedules() {
    let rig = rig();
    let source = ScriptedSource::new();
    for _ in 0..4 {
        source.push_poll_error("still down");
    }

    let policy = CircuitPolicy { failure_threshold: 2, retry_after: Duration::from_millis(60) };
    let spec = spec(&rig, source.clone(), Duration::from_millis(20), policy);
    let health = spec.health.clone();

    rig.scheduler.schedule(spec);
    // Two failures open it, then at least one probe fails and it stays open.
    wait_until(|| source.poll_count() >= 3).await;
    assert!(health.lock().circuit_open);

    rig.scheduler.unschedule("eng", "gh").await;
}

#[tokio::test]
async fn unschedule_waits_for_inflight_poll_cancellation() {
    let rig = rig();
    let source = ScriptedSource::new();

    rig.scheduler.schedule(spec(&rig, source.clone(), Duration::from_millis(20), CircuitPolicy::default()));
    wait_until(|| source.poll_count() >= 1).await;

    rig.scheduler.unschedule("eng", "gh").await;
    assert!(!rig.scheduler.is_scheduled("eng", "gh"));

    // No further polls after unschedule returns.
    let polls = source.poll_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.poll_count(), polls);
}

#[tokio::test]
async fn unschedule_module_tears_down_every_source() {
    let rig = rig();
    let gh = ScriptedSource::new();
    let ci = ScriptedSource::new();

    let mut spec_gh = spec(&rig, gh.clone(), Duration::from_millis(20), CircuitPolicy::default());
    spec_gh.source_name = "gh".to_string();
    let mut spec_ci = spec(&rig, ci.clone(), Duration::from_millis(20), CircuitPolicy::default());
    spec_ci.source_name = "ci".to_string();

    rig.scheduler.schedule(spec_gh);
    rig.scheduler.schedule(spec_ci);
    wait_until(|| gh.poll_count() >= 1 && ci.poll_count() >= 1).await;

    rig.scheduler.unschedule_module("eng").await;
    assert!(!rig.scheduler.is_scheduled("eng", "gh"));
    assert!(!rig.scheduler.is_scheduled("eng", "ci"));
}

#[tokio::test]
async fn publish_failure_skips_checkpoint_persistence() {
    let state_dir = tempdir().unwrap();
    let (errors, mut error_rx) = ErrorSink::new();
    let bus = EventBus::new(errors.clone());
    bus.poison_publishes(1);

    let scheduler = Scheduler::new();
    let checkpoints = CheckpointStore::new(state_dir.path().join("modules"));
    let source = ScriptedSource::new();
    source.push_poll(vec![test_event("gh", "resource.changed")], Some("cursor:1"));
    // Second poll publishes fine and carries its own cursor.
    source.push_poll(vec![test_event("gh", "resource.changed")], Some("cursor:2"));

    scheduler.schedule(PollSpec {
        module: "eng".to_string(),
        source_name: "gh".to_string(),
        source: source.clone(),
        interval: Duration::from_millis(30),
        health: Arc::new(Mutex::new(SourceHealth::default())),
        bus,
        checkpoints: checkpoints.clone(),
        fanout: LoggerFanout::new(),
        errors,
        policy: CircuitPolicy::default(),
        clock: SystemClock,
        cancel: CancellationToken::new(),
    });

    let err = tokio::time::timeout(Duration::from_secs(2), error_rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(err, RuntimeError::Publish(_)));

    // The aborted poll's cursor never landed; the next poll starts from the
    // prior checkpoint (here: none) and persists its own.
    wait_until(|| source.poll_count() >= 2).await;
    wait_until(|| checkpoints.load("eng", "gh").unwrap().is_some()).await;
    assert_eq!(checkpoints.load("eng", "gh").unwrap().as_deref(), Some("cursor:2"));
    assert_eq!(source.checkpoints_seen()[1], None);

    scheduler.unschedule("eng", "gh").await;
}
