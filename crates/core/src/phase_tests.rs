// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::EventKind;
use yare::parameterized;

#[parameterized(
    deliver_success = { Phase::DeliverSuccess, true },
    deliver_failure = { Phase::DeliverFailure, true },
    transform_drop = { Phase::TransformDrop, true },
    error_drop = { Phase::TransformErrorDrop, true },
    error_halt = { Phase::TransformErrorHalt, true },
    no_match = { Phase::RouteNoMatch, true },
    source_emit = { Phase::SourceEmit, false },
    transform_start = { Phase::TransformStart, false },
    route_match = { Phase::RouteMatch, false },
    deliver_attempt = { Phase::DeliverAttempt, false },
)]
fn terminality(phase: Phase, terminal: bool) {
    assert_eq!(phase.is_terminal(), terminal);
}

#[test]
fn phase_serializes_to_dotted_name() {
    assert_eq!(serde_json::to_string(&Phase::TransformErrorDrop).unwrap(), "\"transform.error_drop\"");
    assert_eq!(Phase::RouteNoMatch.to_string(), "route.no_match");
}

#[test]
fn event_record_carries_ids_and_source() {
    let event = Event::new("gh", EventKind::ResourceChanged, Utc::now());
    let record = PhaseRecord::for_event(Phase::SourceEmit, &event, Utc::now())
        .with_module("eng");
    assert_eq!(record.event_id, Some(event.id));
    assert_eq!(record.trace_id, Some(event.trace_id));
    assert_eq!(record.source.as_deref(), Some("gh"));
    assert_eq!(record.module.as_deref(), Some("eng"));
}

#[test]
fn record_json_omits_absent_fields() {
    let record = PhaseRecord::system(Phase::SystemStart, Utc::now());
    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("system.start"));
    assert!(!json.contains("event_id"));
    assert!(!json.contains("route"));
}
