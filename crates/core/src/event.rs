// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical event value type.
//!
//! Events are immutable after creation. Sources produce them, the bus carries
//! them, transforms may replace them with a successor, actors receive them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::define_id! {
    /// Unique identifier for one event within the process.
    pub struct EventId("evt_");
}

crate::define_id! {
    /// Correlation identifier shared by all phase records for one event's
    /// journey, and propagated to successor events through the pipeline.
    pub struct TraceId("trc_");
}

/// Kind of observation an event represents.
///
/// The three well-known kinds cover the normalized source taxonomy; anything
/// else round-trips through `Other` so new connectors can extend the set
/// without a core change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResourceChanged,
    ActorStopped,
    MessageReceived,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ResourceChanged => "resource.changed",
            EventKind::ActorStopped => "actor.stopped",
            EventKind::MessageReceived => "message.received",
            EventKind::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "resource.changed" => EventKind::ResourceChanged,
            "actor.stopped" => EventKind::ActorStopped,
            "message.received" => EventKind::MessageReceived,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        EventKind::parse(s)
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&s))
    }
}

/// The canonical unit of work flowing through the runtime.
///
/// `provenance` holds normalized origin metadata (platform, author, …) as
/// scalars; `payload` is the source-specific body. Both are addressable by
/// dotted path via [`Event::lookup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub trace_id: TraceId,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub provenance: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event with fresh `id` and `trace_id`, timestamped `now`.
    pub fn new(source: impl Into<String>, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            trace_id: TraceId::new(),
            timestamp,
            source: source.into(),
            kind,
            provenance: Map::new(),
            payload: Map::new(),
        }
    }

    /// Produce a successor event carrying this event's trace.
    ///
    /// Used by transforms: the successor gets a fresh `id` but keeps the
    /// `trace_id` so phase records stay correlated.
    pub fn successor(&self) -> Self {
        let mut next = self.clone();
        next.id = EventId::new();
        next.trace_id = self.trace_id;
        next
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_provenance(mut self, provenance: Map<String, Value>) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Resolve a dotted path against this event.
    ///
    /// The first segment selects a top-level field; `provenance.*` and
    /// `payload.*` traverse nested mappings. A missing segment yields `None`,
    /// never an error.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match head {
            "id" => rest.is_none().then(|| Value::String(self.id.to_string())),
            "trace_id" => rest.is_none().then(|| Value::String(self.trace_id.to_string())),
            "timestamp" => rest.is_none().then(|| Value::String(self.timestamp.to_rfc3339())),
            "source" => rest.is_none().then(|| Value::String(self.source.clone())),
            "type" => rest.is_none().then(|| Value::String(self.kind.as_str().to_string())),
            "provenance" => lookup_in(&self.provenance, rest),
            "payload" => lookup_in(&self.payload, rest),
            _ => None,
        }
    }
}

fn lookup_in(map: &Map<String, Value>, path: Option<&str>) -> Option<Value> {
    let path = match path {
        Some(p) => p,
        None => return Some(Value::Object(map.clone())),
    };
    let mut current: &Value = map.get(path.split('.').next()?)?;
    for segment in path.split('.').skip(1) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// Compare an expected filter value against a value found on an event.
///
/// Scalars compare by deep equality; a string expectation also matches a
/// non-string scalar whose canonical string form is equal, so filters can be
/// written as plain strings regardless of payload typing.
pub fn value_matches(expected: &Value, found: &Value) -> bool {
    if expected == found {
        return true;
    }
    match (expected, found) {
        (Value::String(want), Value::Number(n)) => want == &n.to_string(),
        (Value::String(want), Value::Bool(b)) => want == if *b { "true" } else { "false" },
        _ => false,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
