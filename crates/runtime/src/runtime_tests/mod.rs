// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime scenario tests

mod delivery;
mod durability;
mod modules;
mod transforms;
mod webhooks;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use sy_core::{
    ActorDef, LoggerDef, ModuleConfig, Route, SourceDef, SystemClock, Target, TransformDef,
    TransformRef, Trigger,
};
use tempfile::TempDir;

use super::*;
use crate::module::ResolvedConnectors;
use crate::test_support::{
    test_event, MemoryLogger, RecordingActor, ScriptedSource, TestTransform,
};

pub(crate) struct TestRig {
    pub runtime: Arc<Runtime<SystemClock>>,
    state: TempDir,
}

impl TestRig {
    pub fn new() -> Self {
        let state = TempDir::new().unwrap();
        let mut options = RuntimeOptions::new(state.path().join("modules"));
        options.delivery_timeout = Duration::from_secs(2);
        options.drain_timeout = Duration::from_secs(2);
        let runtime = Arc::new(Runtime::new(options).unwrap());
        Self { runtime, state }
    }

    pub fn durable(self) -> Self {
        let wal_path = self.state.path().join("wal").join("events.wal");
        let mut options = RuntimeOptions::new(self.state.path().join("modules")).durable(wal_path);
        options.delivery_timeout = Duration::from_secs(2);
        options.drain_timeout = Duration::from_secs(2);
        let runtime = Arc::new(Runtime::new(options).unwrap());
        Self { runtime, state: self.state }
    }

    pub fn wal_path(&self) -> std::path::PathBuf {
        self.state.path().join("wal").join("events.wal")
    }

    /// Wait for every published event to reach a terminal phase and ack.
    pub async fn settle(&self) {
        wait_until(|| self.runtime.bus().pending_count() == 0).await;
    }
}

pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

/// Declarative module fixture: config plus the scripted connector instances
/// behind it, so tests keep handles to everything they load.
pub(crate) struct TestModule {
    pub config: ModuleConfig,
    pub sources: HashMap<String, Arc<ScriptedSource>>,
    pub actors: HashMap<String, Arc<RecordingActor>>,
    pub transforms: HashMap<String, Arc<TestTransform>>,
    pub logger: Arc<MemoryLogger>,
}

impl TestModule {
    pub fn new(name: &str) -> Self {
        let mut config = ModuleConfig::new(name);
        config.loggers.push(LoggerDef {
            name: "mem".to_string(),
            kind: "memory".to_string(),
            config: Map::new(),
        });
        Self {
            config,
            sources: HashMap::new(),
            actors: HashMap::new(),
            transforms: HashMap::new(),
            logger: MemoryLogger::new(),
        }
    }

    /// Webhook-less source with no poll interval; tests inject directly.
    pub fn source(mut self, name: &str) -> Self {
        self.config.sources.push(SourceDef::new(name, "scripted"));
        self.sources.insert(name.to_string(), ScriptedSource::new());
        self
    }

    pub fn polling_source(mut self, name: &str, interval: &str) -> Self {
        self.config.sources.push(SourceDef::new(name, "scripted").with_interval(interval));
        self.sources.insert(name.to_string(), ScriptedSource::new());
        self
    }

    pub fn webhook_source(mut self, name: &str, events: Vec<sy_core::Event>) -> Self {
        self.config.sources.push(SourceDef::new(name, "scripted"));
        let source = ScriptedSource::new();
        source.set_webhook_events(events);
        self.sources.insert(name.to_string(), source);
        self
    }

    pub fn actor(self, name: &str) -> Self {
        self.actor_with(name, RecordingActor::new())
    }

    pub fn actor_with(mut self, name: &str, actor: Arc<RecordingActor>) -> Self {
        self.config.actors.push(ActorDef::new(name, "recording"));
        self.actors.insert(name.to_string(), actor);
        self
    }

    pub fn transform(mut self, def: TransformDef, implementation: Arc<TestTransform>) -> Self {
        self.transforms.insert(def.name.clone(), implementation);
        self.config.transforms.push(def);
        self
    }

    pub fn script_transform(mut self, def: TransformDef) -> Self {
        self.config.transforms.push(def);
        self
    }

    /// Route from `source` on `resource.changed` through `transforms` to
    /// `actor`.
    pub fn route(mut self, name: &str, source: &str, transforms: &[&str], actor: &str) -> Self {
        self.config.routes.push(Route {
            name: name.to_string(),
            when: Trigger {
                source: source.to_string(),
                events: vec!["resource.changed".into()],
                filter: Map::new(),
            },
            transforms: transforms.iter().map(|t| TransformRef::new(*t)).collect(),
            then: Target { actor: actor.to_string(), config: Map::new() },
            prompt_text: None,
        });
        self
    }

    pub fn route_with(mut self, route: Route) -> Self {
        self.config.routes.push(route);
        self
    }

    pub fn connectors(&self) -> ResolvedConnectors {
        let mut resolved = ResolvedConnectors::default();
        for (name, source) in &self.sources {
            resolved.sources.insert(name.clone(), source.clone());
        }
        for (name, actor) in &self.actors {
            resolved.actors.insert(name.clone(), actor.clone());
        }
        for (name, transform) in &self.transforms {
            resolved.transforms.insert(name.clone(), transform.clone());
        }
        resolved.loggers.insert("mem".to_string(), self.logger.clone());
        resolved
    }
}
