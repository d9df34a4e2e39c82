// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime error taxonomy and the shared error channel.
//!
//! Errors in background work (polls, pipelines, deliveries) never reach the
//! caller of a control operation. They are reported on one channel that the
//! daemon drains and tests observe; control-surface callers get errors as
//! return values.

use sy_core::ConfigError;
use sy_storage::WalError;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pipeline::TransformError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("module already loaded: {0}")]
    ModuleAlreadyLoaded(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module {module} failed to initialize: {message}")]
    ModuleInit { module: String, message: String },

    #[error("source {module}/{source_name} poll failed: {message}")]
    SourcePoll { module: String, source_name: String, message: String },

    #[error("transform halted route {route}")]
    TransformHalt {
        route: String,
        #[source]
        source: TransformError,
    },

    #[error("delivery to {module}/{actor} failed: {message}")]
    Delivery { module: String, actor: String, message: String },

    #[error("bus publish failed: {0}")]
    Publish(#[from] WalError),

    #[error("checkpoint for {module}/{source_name} failed: {message}")]
    Checkpoint { module: String, source_name: String, message: String },

    #[error("webhook source {0} is already registered")]
    WebhookConflict(String),

    #[error("no webhook source registered as {0}")]
    WebhookUnknownSource(String),

    #[error("webhook handler for {source_id} failed: {message}")]
    Webhook { source_id: String, message: String },
}

/// Sender half of the runtime error channel.
///
/// Cheap to clone into background tasks. `report` never blocks and tolerates
/// a dropped receiver (the daemon may already be shutting down).
#[derive(Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<RuntimeError>,
}

impl ErrorSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RuntimeError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, error: RuntimeError) {
        tracing::error!(error = %error, "runtime error");
        let _ = self.tx.send(error);
    }
}
