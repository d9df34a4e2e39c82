// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module configuration: the named bundle of sources, actors, routes,
//! transforms, and loggers that the runtime manages as one workload.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::route::{Route, TransformDef};

/// Declaration of a source connector within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDef {
    pub name: String,
    /// Connector implementation name, resolved by the connector factory.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Poll cadence as a duration string ("5m", "1h"). Absent for
    /// webhook-only sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

impl SourceDef {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { name: name.into(), kind: kind.into(), config: Map::new(), poll_interval: None }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.poll_interval = Some(interval.into());
        self
    }
}

/// Declaration of an actor connector within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDef {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl ActorDef {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { name: name.into(), kind: kind.into(), config: Map::new() }
    }
}

/// Declaration of a logger within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerDef {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

/// Module-wide fallbacks applied where a declaration leaves a value unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleDefaults {
    /// Fallback poll cadence for sources that declare none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

/// A named bundle of connectors and routes, loaded and unloaded as a unit.
///
/// The `name` is the module's singleton identity across the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<ActorDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loggers: Vec<LoggerDef>,
    #[serde(default)]
    pub defaults: ModuleDefaults,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            actors: Vec::new(),
            routes: Vec::new(),
            transforms: Vec::new(),
            loggers: Vec::new(),
            defaults: ModuleDefaults::default(),
        }
    }

    /// Effective poll interval for a source, applying module defaults.
    ///
    /// `None` means the source is webhook-only and is never scheduled.
    pub fn poll_interval(&self, source: &SourceDef) -> Result<Option<Duration>, ConfigError> {
        let raw = source.poll_interval.as_deref().or(self.defaults.poll_interval.as_deref());
        raw.map(parse_duration).transpose()
    }

    /// Structural validation, run before any connector is initialized.
    ///
    /// Checks name uniqueness per section, name path-safety (names become
    /// checkpoint file names and webhook URL segments), non-empty trigger
    /// event sets, and that every route reference resolves within the module.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::missing("name"));
        }
        require_path_safe("name", &self.name)?;

        let sources = unique_names("sources", self.sources.iter().map(|s| s.name.as_str()))?;
        let actors = unique_names("actors", self.actors.iter().map(|a| a.name.as_str()))?;
        let transforms =
            unique_names("transforms", self.transforms.iter().map(|t| t.name.as_str()))?;
        unique_names("loggers", self.loggers.iter().map(|l| l.name.as_str()))?;
        unique_names("routes", self.routes.iter().map(|r| r.name.as_str()))?;

        for source in &self.sources {
            require_path_safe("sources", &source.name)?;
            // Surface a bad interval at load time, not on first schedule.
            self.poll_interval(source)?;
        }

        for route in &self.routes {
            if route.when.events.is_empty() {
                return Err(ConfigError::invalid(
                    format!("routes.{}.when.events", route.name),
                    "must list at least one event type",
                ));
            }
            if !sources.contains(route.when.source.as_str()) {
                return Err(ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "source",
                    name: route.when.source.clone(),
                });
            }
            if !actors.contains(route.then.actor.as_str()) {
                return Err(ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "actor",
                    name: route.then.actor.clone(),
                });
            }
            for transform in &route.transforms {
                if !transforms.contains(transform.name.as_str()) {
                    return Err(ConfigError::UnknownReference {
                        route: route.name.clone(),
                        kind: "transform",
                        name: transform.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn unique_names<'a>(
    section: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                section: section.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(seen)
}

fn require_path_safe(section: &str, name: &str) -> Result<(), ConfigError> {
    let ok = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            section,
            format!("name {:?} must be non-empty and contain only [A-Za-z0-9._-]", name),
        ))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
