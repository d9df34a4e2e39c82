// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route and transform configuration types.
//!
//! A route is a declarative rule from trigger to target: which source and
//! event kinds it fires on, the transforms the event passes through, and the
//! actor that finally receives it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{value_matches, Event, EventKind};

/// Default timeout for a single transform invocation.
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 30_000;

/// What to do when a transform raises or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Event continues unchanged to the next transform.
    #[default]
    Pass,
    /// Event is dropped; the pipeline halts.
    Drop,
    /// Pipeline aborts before delivery and the error surfaces as fatal.
    Halt,
}

/// A declarative rule from trigger to target. Unique by name within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub when: Trigger,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformRef>,
    pub then: Target,
    /// Pre-resolved prompt passed alongside the event on delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

/// Trigger half of a route: source, event kinds, optional field filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub source: String,
    pub events: Vec<EventKind>,
    /// Dotted-path → expected value; all entries must match.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
}

impl Trigger {
    /// Whether this trigger fires for the given event.
    ///
    /// Source must be equal, kind must be a member of `events`, and every
    /// filter path must resolve on the event to a matching value. A path
    /// that resolves to nothing never matches.
    pub fn matches(&self, event: &Event) -> bool {
        if event.source != self.source {
            return false;
        }
        if !self.events.contains(&event.kind) {
            return false;
        }
        self.filter.iter().all(|(path, expected)| {
            event.lookup(path).is_some_and(|found| value_matches(expected, &found))
        })
    }
}

/// Target half of a route: the actor and its per-route configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub actor: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

/// Reference to a transform from a route, with optional policy override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRef {
    #[serde(rename = "ref")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
}

impl TransformRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), on_error: None }
    }
}

/// How a transform is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// In-process implementation resolved by name.
    Package,
    /// External process, one invocation per event over stdin/stdout.
    Script,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TRANSFORM_TIMEOUT_MS
}

/// Transform definition. Unique by name within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDef {
    pub name: String,
    pub kind: TransformKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub on_error: OnError,
}

impl TransformDef {
    pub fn package(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransformKind::Package,
            config: Map::new(),
            timeout_ms: DEFAULT_TRANSFORM_TIMEOUT_MS,
            on_error: OnError::default(),
        }
    }

    pub fn script(name: impl Into<String>, command: impl Into<String>) -> Self {
        let mut config = Map::new();
        config.insert("command".to_string(), Value::String(command.into()));
        Self {
            name: name.into(),
            kind: TransformKind::Script,
            config,
            timeout_ms: DEFAULT_TRANSFORM_TIMEOUT_MS,
            on_error: OnError::default(),
        }
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
