// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured log phases.
//!
//! Every event's journey through the runtime emits phase records: one per
//! state transition, all sharing the event's trace id. Loggers receive these
//! records via the fan-out; tests assert on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventId, TraceId};

/// The complete phase taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "system.start")]
    SystemStart,
    #[serde(rename = "system.stop")]
    SystemStop,
    #[serde(rename = "system.error")]
    SystemError,
    #[serde(rename = "source.emit")]
    SourceEmit,
    #[serde(rename = "transform.start")]
    TransformStart,
    #[serde(rename = "transform.pass")]
    TransformPass,
    #[serde(rename = "transform.drop")]
    TransformDrop,
    #[serde(rename = "transform.error")]
    TransformError,
    #[serde(rename = "transform.error_drop")]
    TransformErrorDrop,
    #[serde(rename = "transform.error_halt")]
    TransformErrorHalt,
    #[serde(rename = "route.match")]
    RouteMatch,
    #[serde(rename = "route.no_match")]
    RouteNoMatch,
    #[serde(rename = "deliver.attempt")]
    DeliverAttempt,
    #[serde(rename = "deliver.success")]
    DeliverSuccess,
    #[serde(rename = "deliver.failure")]
    DeliverFailure,
    #[serde(rename = "deliver.retry")]
    DeliverRetry,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::SystemStart => "system.start",
            Phase::SystemStop => "system.stop",
            Phase::SystemError => "system.error",
            Phase::SourceEmit => "source.emit",
            Phase::TransformStart => "transform.start",
            Phase::TransformPass => "transform.pass",
            Phase::TransformDrop => "transform.drop",
            Phase::TransformError => "transform.error",
            Phase::TransformErrorDrop => "transform.error_drop",
            Phase::TransformErrorHalt => "transform.error_halt",
            Phase::RouteMatch => "route.match",
            Phase::RouteNoMatch => "route.no_match",
            Phase::DeliverAttempt => "deliver.attempt",
            Phase::DeliverSuccess => "deliver.success",
            Phase::DeliverFailure => "deliver.failure",
            Phase::DeliverRetry => "deliver.retry",
        }
    }

    /// Whether this phase ends an event's journey through one route
    /// (or, for `route.no_match`, through the whole module).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::DeliverSuccess
                | Phase::DeliverFailure
                | Phase::TransformDrop
                | Phase::TransformErrorDrop
                | Phase::TransformErrorHalt
                | Phase::RouteNoMatch
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured record handed to every logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    /// Absent only for `system.*` phases not tied to one event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseRecord {
    pub fn system(phase: Phase, timestamp: DateTime<Utc>) -> Self {
        Self {
            phase,
            timestamp,
            event_id: None,
            trace_id: None,
            module: None,
            source: None,
            target: None,
            route: None,
            transform: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Record tied to one event; carries its id, trace, and source.
    pub fn for_event(phase: Phase, event: &Event, timestamp: DateTime<Utc>) -> Self {
        let mut record = Self::system(phase, timestamp);
        record.event_id = Some(event.id);
        record.trace_id = Some(event.trace_id);
        record.source = Some(event.source.clone());
        record
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
