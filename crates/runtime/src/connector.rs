// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector contracts: the four capability sets concrete implementations
//! plug into.
//!
//! Implementations are discovered at configuration time and registered by
//! name through a [`ConnectorFactory`]; the runtime only ever sees these
//! trait objects.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sy_core::{ConfigError, Event, ModuleConfig, PhaseRecord};
use thiserror::Error;

use crate::error::RuntimeError;
use crate::module::ResolvedConnectors;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Failed(String),
}

impl ConnectorError {
    pub fn failed(message: impl Into<String>) -> Self {
        ConnectorError::Failed(message.into())
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Result of one source poll: well-formed events in emission order, plus the
/// opaque token to resume from next time.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub events: Vec<Event>,
    /// Polling again with this token must yield only events strictly after
    /// the ones returned here. `None` leaves the stored checkpoint untouched.
    pub next_checkpoint: Option<String>,
}

/// Inbound webhook request as the runtime hands it to a source.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// What a webhook-capable source produced from a request: the HTTP reply to
/// write, and the events to inject on behalf of the owning module.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
    pub events: Vec<Event>,
}

/// A capability that produces events, by polling or by webhook.
#[async_trait]
pub trait Source: Send + Sync {
    /// Set up transport. Must fail when a required option is missing.
    async fn init(&self, config: &Map<String, Value>) -> ConnectorResult<()>;

    async fn poll(&self, checkpoint: Option<String>) -> ConnectorResult<PollOutcome>;

    /// Whether the runtime should register this source for webhook ingress.
    fn accepts_webhooks(&self) -> bool {
        false
    }

    async fn webhook(&self, request: WebhookRequest) -> ConnectorResult<WebhookResponse> {
        let _ = request;
        Err(ConnectorError::failed("source does not accept webhooks"))
    }

    /// Release resources. Idempotent.
    async fn shutdown(&self) -> ConnectorResult<()>;
}

/// Outcome of a delivery the actor reported itself.
///
/// Transport and actor-side failures travel as `Err(ConnectorError)` instead.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Actor accepted synchronously.
    Delivered { response: Option<Event> },
    /// Actor explicitly refused; not retriable.
    Rejected { reason: String },
}

/// A target capable of receiving an event.
#[async_trait]
pub trait Actor: Send + Sync {
    async fn init(&self, config: &Map<String, Value>) -> ConnectorResult<()>;

    async fn deliver(
        &self,
        event: &Event,
        route_config: &Map<String, Value>,
        prompt_text: Option<&str>,
    ) -> ConnectorResult<Delivery>;

    async fn shutdown(&self) -> ConnectorResult<()>;
}

/// What a transform did with an event.
#[derive(Debug, Clone)]
pub enum TransformOutcome {
    /// Successor event (possibly identical) continues down the pipeline.
    Next(Event),
    /// Pipeline terminates; the event is not delivered.
    Drop,
}

/// Context handed to every transform invocation.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub source: String,
    pub target: String,
    pub event_type: String,
    pub route_name: String,
    pub module_name: String,
}

/// A capability that inspects and optionally modifies or drops an event.
///
/// Only package-kind transforms implement this; script-kind transforms are
/// executed by the runtime's script runner.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn init(&self, config: &Map<String, Value>) -> ConnectorResult<()>;

    async fn execute(
        &self,
        event: Event,
        context: &TransformContext,
    ) -> ConnectorResult<TransformOutcome>;

    async fn shutdown(&self) -> ConnectorResult<()>;
}

/// A sink for structured phase records.
#[async_trait]
pub trait Logger: Send + Sync {
    async fn init(&self, config: &Map<String, Value>) -> ConnectorResult<()>;

    async fn log(&self, record: &PhaseRecord) -> ConnectorResult<()>;

    async fn flush(&self) -> ConnectorResult<()>;

    async fn shutdown(&self) -> ConnectorResult<()>;
}

/// Resolves a module's declared connector kinds into live instances.
///
/// This is the seam where connector packages register; the runtime is
/// generic over it and the daemon takes one at startup.
pub trait ConnectorFactory: Send + Sync {
    fn resolve(&self, config: &ModuleConfig) -> Result<ResolvedConnectors, RuntimeError>;
}
