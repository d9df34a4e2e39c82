// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap()
}

fn policy() -> CircuitPolicy {
    CircuitPolicy { failure_threshold: 5, retry_after: Duration::from_secs(60) }
}

#[test]
fn first_failure_degrades() {
    let mut health = SourceHealth::default();
    let opened = health.record_failure("boom", at(0), &policy());
    assert!(!opened);
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.consecutive_errors, 1);
    assert!(!health.circuit_open);
    assert_eq!(health.last_error.as_deref(), Some("boom"));
}

#[test]
fn success_after_degraded_restores_healthy() {
    let mut health = SourceHealth::default();
    health.record_failure("boom", at(0), &policy());
    health.record_failure("boom", at(1), &policy());
    health.record_success(at(2));
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.consecutive_errors, 0);
    assert_eq!(health.last_successful_poll, Some(at(2)));
    assert!(health.last_error.is_none());
}

#[test]
fn threshold_opens_circuit_exactly_once() {
    let mut health = SourceHealth::default();
    let p = policy();
    for n in 1..5 {
        assert!(!health.record_failure("err", at(n), &p));
        assert_eq!(health.status, HealthStatus::Degraded);
    }
    // Fifth consecutive error trips the breaker.
    assert!(health.record_failure("err", at(5), &p));
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert!(health.circuit_open);
    assert_eq!(health.circuit_retry_deadline, Some(at(5 + 60_000)));

    // A failed probe reschedules but does not report a fresh trip.
    assert!(!health.record_failure("err again", at(70_000), &p));
    assert_eq!(health.circuit_retry_deadline, Some(at(70_000 + 60_000)));
}

#[test]
fn open_circuit_blocks_polls_until_deadline() {
    let mut health = SourceHealth::default();
    let p = policy();
    for n in 0..5 {
        health.record_failure("err", at(n), &p);
    }
    assert!(!health.poll_permitted(at(10_000)));
    assert!(!health.circuit_ready(at(10_000)));

    // Deadline elapsed: exactly one probe is allowed.
    assert!(health.poll_permitted(at(60_004)));
    assert!(health.circuit_ready(at(60_004)));
}

#[test]
fn probe_success_closes_circuit() {
    let mut health = SourceHealth::default();
    let p = policy();
    for n in 0..5 {
        health.record_failure("err", at(n), &p);
    }
    health.record_success(at(61_000));
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(!health.circuit_open);
    assert_eq!(health.consecutive_errors, 0);
    assert!(health.circuit_retry_deadline.is_none());
    assert!(health.poll_permitted(at(61_001)));
}

#[test]
fn closed_circuit_is_never_ready() {
    let health = SourceHealth::default();
    assert!(!health.circuit_ready(at(0)));
    assert!(health.poll_permitted(at(0)));
}

#[test]
fn emitted_counter_accumulates() {
    let mut health = SourceHealth::default();
    health.record_emitted(3);
    health.record_emitted(2);
    assert_eq!(health.total_events_emitted, 5);
}
