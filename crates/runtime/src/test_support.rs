// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted connectors for tests.
//!
//! These doubles record every interaction (init/poll/deliver/shutdown counts)
//! so scenario tests can assert on connector contracts without real
//! transports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sy_core::{Event, EventId, EventKind, ModuleConfig, Phase, PhaseRecord};

use crate::connector::{
    Actor, ConnectorError, ConnectorFactory, ConnectorResult, Delivery, Logger, PollOutcome,
    Source, Transform, TransformContext, TransformOutcome, WebhookRequest, WebhookResponse,
};
use crate::error::RuntimeError;
use crate::module::ResolvedConnectors;

/// Build a minimal well-formed event for tests.
pub fn test_event(source: &str, kind: &str) -> Event {
    Event::new(source, EventKind::parse(kind), Utc::now())
}

/// Source double fed by a queue of poll results.
///
/// An empty queue polls as "no new events, keep the checkpoint". When
/// `webhook_events` is set the source is webhook-capable and replies 200
/// with those events.
#[derive(Default)]
pub struct ScriptedSource {
    polls: Mutex<VecDeque<Result<PollOutcome, String>>>,
    checkpoints_seen: Mutex<Vec<Option<String>>>,
    webhook_events: Mutex<Option<Vec<Event>>>,
    init_count: AtomicU32,
    shutdown_count: AtomicU32,
    init_error: Mutex<Option<String>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_poll(&self, events: Vec<Event>, next_checkpoint: Option<&str>) {
        self.polls.lock().push_back(Ok(PollOutcome {
            events,
            next_checkpoint: next_checkpoint.map(str::to_string),
        }));
    }

    pub fn push_poll_error(&self, message: &str) {
        self.polls.lock().push_back(Err(message.to_string()));
    }

    pub fn fail_init(&self, message: &str) {
        *self.init_error.lock() = Some(message.to_string());
    }

    pub fn set_webhook_events(&self, events: Vec<Event>) {
        *self.webhook_events.lock() = Some(events);
    }

    /// Checkpoints passed to `poll`, in order.
    pub fn checkpoints_seen(&self) -> Vec<Option<String>> {
        self.checkpoints_seen.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.checkpoints_seen.lock().len()
    }

    pub fn init_count(&self) -> u32 {
        self.init_count.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for ScriptedSource {
    async fn init(&self, _config: &Map<String, Value>) -> ConnectorResult<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        match self.init_error.lock().clone() {
            Some(message) => Err(ConnectorError::failed(message)),
            None => Ok(()),
        }
    }

    async fn poll(&self, checkpoint: Option<String>) -> ConnectorResult<PollOutcome> {
        self.checkpoints_seen.lock().push(checkpoint);
        match self.polls.lock().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(ConnectorError::failed(message)),
            None => Ok(PollOutcome::default()),
        }
    }

    fn accepts_webhooks(&self) -> bool {
        self.webhook_events.lock().is_some()
    }

    async fn webhook(&self, _request: WebhookRequest) -> ConnectorResult<WebhookResponse> {
        match self.webhook_events.lock().clone() {
            Some(events) => Ok(WebhookResponse {
                status: 200,
                body: serde_json::json!({"ok": true, "events": events.len()}),
                events,
            }),
            None => Err(ConnectorError::failed("source does not accept webhooks")),
        }
    }

    async fn shutdown(&self) -> ConnectorResult<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
enum ActorBehavior {
    Deliver,
    Reject(String),
    Fail(String),
    Hang,
}

/// Actor double that records deliveries and answers per a fixed behavior.
pub struct RecordingActor {
    behavior: Mutex<ActorBehavior>,
    deliveries: Mutex<Vec<(Event, Option<String>)>>,
    init_count: AtomicU32,
    shutdown_count: AtomicU32,
}

impl RecordingActor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(ActorBehavior::Deliver),
            deliveries: Mutex::new(Vec::new()),
            init_count: AtomicU32::new(0),
            shutdown_count: AtomicU32::new(0),
        })
    }

    pub fn rejecting(reason: &str) -> Arc<Self> {
        let actor = Self::new();
        *actor.behavior.lock() = ActorBehavior::Reject(reason.to_string());
        actor
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let actor = Self::new();
        *actor.behavior.lock() = ActorBehavior::Fail(message.to_string());
        actor
    }

    /// Never completes a delivery; for timeout tests.
    pub fn hanging() -> Arc<Self> {
        let actor = Self::new();
        *actor.behavior.lock() = ActorBehavior::Hang;
        actor
    }

    pub fn delivered(&self) -> Vec<Event> {
        self.deliveries.lock().iter().map(|(event, _)| event.clone()).collect()
    }

    pub fn prompts(&self) -> Vec<Option<String>> {
        self.deliveries.lock().iter().map(|(_, prompt)| prompt.clone()).collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn init_count(&self) -> u32 {
        self.init_count.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Actor for RecordingActor {
    async fn init(&self, _config: &Map<String, Value>) -> ConnectorResult<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver(
        &self,
        event: &Event,
        _route_config: &Map<String, Value>,
        prompt_text: Option<&str>,
    ) -> ConnectorResult<Delivery> {
        self.deliveries.lock().push((event.clone(), prompt_text.map(str::to_string)));
        // Snapshot the behavior so no lock is held across an await.
        let behavior = self.behavior.lock().clone();
        match behavior {
            ActorBehavior::Deliver => Ok(Delivery::Delivered { response: None }),
            ActorBehavior::Reject(reason) => Ok(Delivery::Rejected { reason }),
            ActorBehavior::Fail(message) => Err(ConnectorError::failed(message)),
            ActorBehavior::Hang => std::future::pending().await,
        }
    }

    async fn shutdown(&self) -> ConnectorResult<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type MapFn = dyn Fn(Event) -> Event + Send + Sync;
type PredFn = dyn Fn(&Event) -> bool + Send + Sync;

enum TransformBehavior {
    Pass,
    Map(Box<MapFn>),
    DropIf(Box<PredFn>),
    Fail(String),
    Sleep(Duration),
}

/// Package-transform double.
pub struct TestTransform {
    behavior: TransformBehavior,
    init_count: AtomicU32,
    shutdown_count: AtomicU32,
    invocations: AtomicU32,
}

impl TestTransform {
    fn with_behavior(behavior: TransformBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            init_count: AtomicU32::new(0),
            shutdown_count: AtomicU32::new(0),
            invocations: AtomicU32::new(0),
        })
    }

    /// Identity transform.
    pub fn passthrough() -> Arc<Self> {
        Self::with_behavior(TransformBehavior::Pass)
    }

    pub fn mapping(f: impl Fn(Event) -> Event + Send + Sync + 'static) -> Arc<Self> {
        Self::with_behavior(TransformBehavior::Map(Box::new(f)))
    }

    pub fn dropping_if(p: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Self::with_behavior(TransformBehavior::DropIf(Box::new(p)))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_behavior(TransformBehavior::Fail(message.to_string()))
    }

    pub fn sleeping(duration: Duration) -> Arc<Self> {
        Self::with_behavior(TransformBehavior::Sleep(duration))
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for TestTransform {
    async fn init(&self, _config: &Map<String, Value>) -> ConnectorResult<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(
        &self,
        event: Event,
        _context: &TransformContext,
    ) -> ConnectorResult<TransformOutcome> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            TransformBehavior::Pass => Ok(TransformOutcome::Next(event)),
            TransformBehavior::Map(f) => Ok(TransformOutcome::Next(f(event))),
            TransformBehavior::DropIf(p) => {
                if p(&event) {
                    Ok(TransformOutcome::Drop)
                } else {
                    Ok(TransformOutcome::Next(event))
                }
            }
            TransformBehavior::Fail(message) => Err(ConnectorError::failed(message.clone())),
            TransformBehavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(TransformOutcome::Next(event))
            }
        }
    }

    async fn shutdown(&self) -> ConnectorResult<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Logger double collecting every record in memory.
#[derive(Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<PhaseRecord>>,
    flush_count: AtomicU32,
    shutdown_count: AtomicU32,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<PhaseRecord> {
        self.records.lock().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.records.lock().iter().map(|r| r.phase).collect()
    }

    /// Phase records for one event, in emission order.
    pub fn records_for(&self, event_id: &EventId) -> Vec<PhaseRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.event_id.as_ref() == Some(event_id))
            .cloned()
            .collect()
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.records.lock().iter().any(|r| r.phase == phase)
    }

    pub fn count_phase(&self, phase: Phase) -> usize {
        self.records.lock().iter().filter(|r| r.phase == phase).count()
    }

    pub fn flush_count(&self) -> u32 {
        self.flush_count.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Logger for MemoryLogger {
    async fn init(&self, _config: &Map<String, Value>) -> ConnectorResult<()> {
        Ok(())
    }

    async fn log(&self, record: &PhaseRecord) -> ConnectorResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> ConnectorResult<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> ConnectorResult<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory resolving every declaration to a scripted double, remembering the
/// instances so tests can reach them afterwards. Keys are `module/name`.
#[derive(Default)]
pub struct ScriptedConnectorFactory {
    sources: Mutex<HashMap<String, Arc<ScriptedSource>>>,
    actors: Mutex<HashMap<String, Arc<RecordingActor>>>,
    loggers: Mutex<HashMap<String, Arc<MemoryLogger>>>,
}

impl ScriptedConnectorFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn source(&self, module: &str, name: &str) -> Option<Arc<ScriptedSource>> {
        self.sources.lock().get(&scoped(module, name)).cloned()
    }

    pub fn actor(&self, module: &str, name: &str) -> Option<Arc<RecordingActor>> {
        self.actors.lock().get(&scoped(module, name)).cloned()
    }

    pub fn logger(&self, module: &str, name: &str) -> Option<Arc<MemoryLogger>> {
        self.loggers.lock().get(&scoped(module, name)).cloned()
    }
}

fn scoped(module: &str, name: &str) -> String {
    format!("{}/{}", module, name)
}

impl ConnectorFactory for ScriptedConnectorFactory {
    fn resolve(&self, config: &ModuleConfig) -> Result<ResolvedConnectors, RuntimeError> {
        let mut resolved = ResolvedConnectors::default();
        for def in &config.sources {
            let source = self
                .sources
                .lock()
                .entry(scoped(&config.name, &def.name))
                .or_insert_with(|| Arc::new(ScriptedSource::default()))
                .clone();
            if def.config.get("webhook").and_then(Value::as_bool) == Some(true)
                && !source.accepts_webhooks()
            {
                source.set_webhook_events(Vec::new());
            }
            resolved.sources.insert(def.name.clone(), source);
        }
        for def in &config.actors {
            let actor = self
                .actors
                .lock()
                .entry(scoped(&config.name, &def.name))
                .or_insert_with(RecordingActor::new)
                .clone();
            resolved.actors.insert(def.name.clone(), actor);
        }
        for def in &config.transforms {
            resolved.transforms.insert(def.name.clone(), TestTransform::passthrough());
        }
        for def in &config.loggers {
            let logger = self
                .loggers
                .lock()
                .entry(scoped(&config.name, &def.name))
                .or_insert_with(MemoryLogger::new)
                .clone();
            resolved.loggers.insert(def.name.clone(), logger);
        }
        Ok(resolved)
    }
}
