// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-route transform pipeline.
//!
//! Transforms run in route order. Each invocation emits `transform.start`
//! followed by exactly one outcome phase. Errors resolve against the route's
//! `on_error` override first, then the definition's, then `pass`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sy_core::{
    Clock, Event, OnError, Phase, PhaseRecord, Route, TransformDef, TransformKind,
};
use thiserror::Error;

use crate::connector::{Transform, TransformContext, TransformOutcome};
use crate::fanout::LoggerFanout;
use crate::script;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transform {transform} failed: {message}")]
    Failed { transform: String, message: String },

    #[error("transform {transform} timed out after {timeout_ms}ms")]
    Timeout { transform: String, timeout_ms: u64 },

    #[error("transform {transform} is not registered")]
    Unknown { transform: String },
}

impl TransformError {
    pub fn failed(transform: &str, message: impl Into<String>) -> Self {
        TransformError::Failed { transform: transform.to_string(), message: message.into() }
    }
}

/// A module's transforms, resolved once at load: definitions plus the
/// in-process implementations for package-kind entries.
#[derive(Default)]
pub struct TransformSet {
    defs: HashMap<String, TransformDef>,
    packages: HashMap<String, Arc<dyn Transform>>,
}

impl TransformSet {
    pub fn new(
        defs: impl IntoIterator<Item = TransformDef>,
        packages: HashMap<String, Arc<dyn Transform>>,
    ) -> Self {
        Self { defs: defs.into_iter().map(|d| (d.name.clone(), d)).collect(), packages }
    }

    pub fn def(&self, name: &str) -> Option<&TransformDef> {
        self.defs.get(name)
    }
}

/// How a pipeline run ended.
#[derive(Debug)]
pub enum PipelineVerdict {
    /// Event (possibly transformed) continues to delivery.
    Deliver(Event),
    /// A transform dropped the event; delivery does not happen.
    Dropped,
    /// A `halt` policy fired; delivery does not happen and the error is
    /// additionally fatal on the runtime error channel.
    Halted(TransformError),
}

/// Run a route's transforms over an event.
pub async fn run_pipeline<C: Clock>(
    mut event: Event,
    route: &Route,
    set: &TransformSet,
    context: &TransformContext,
    fanout: &LoggerFanout,
    clock: &C,
    module: &str,
) -> PipelineVerdict {
    for transform_ref in &route.transforms {
        let name = transform_ref.name.as_str();
        let record = |phase: Phase, event: &Event| {
            PhaseRecord::for_event(phase, event, clock.utc_now())
                .with_module(module)
                .with_route(&route.name)
                .with_transform(name)
        };

        fanout.emit(Some(module), record(Phase::TransformStart, &event)).await;
        let started = clock.now();

        let (outcome, policy) = match set.def(name) {
            Some(def) => {
                let policy = transform_ref.on_error.unwrap_or(def.on_error);
                (invoke(def, set, event.clone(), context).await, policy)
            }
            None => {
                // Config validation rejects unknown refs; guard anyway so a
                // racing reload cannot panic the route handler.
                let policy = transform_ref.on_error.unwrap_or_default();
                (Err(TransformError::Unknown { transform: name.to_string() }), policy)
            }
        };
        let elapsed_ms = clock.now().duration_since(started).as_millis() as u64;

        match outcome {
            Ok(TransformOutcome::Next(next)) => {
                fanout
                    .emit(Some(module), record(Phase::TransformPass, &next).with_duration_ms(elapsed_ms))
                    .await;
                event = next;
            }
            Ok(TransformOutcome::Drop) => {
                fanout
                    .emit(Some(module), record(Phase::TransformDrop, &event).with_duration_ms(elapsed_ms))
                    .await;
                return PipelineVerdict::Dropped;
            }
            Err(error) => match policy {
                OnError::Pass => {
                    fanout
                        .emit(
                            Some(module),
                            record(Phase::TransformError, &event).with_error(error.to_string()),
                        )
                        .await;
                }
                OnError::Drop => {
                    fanout
                        .emit(
                            Some(module),
                            record(Phase::TransformErrorDrop, &event).with_error(error.to_string()),
                        )
                        .await;
                    return PipelineVerdict::Dropped;
                }
                OnError::Halt => {
                    fanout
                        .emit(
                            Some(module),
                            record(Phase::TransformErrorHalt, &event).with_error(error.to_string()),
                        )
                        .await;
                    return PipelineVerdict::Halted(error);
                }
            },
        }
    }

    PipelineVerdict::Deliver(event)
}

/// One transform invocation under its definition timeout.
async fn invoke(
    def: &TransformDef,
    set: &TransformSet,
    event: Event,
    context: &TransformContext,
) -> Result<TransformOutcome, TransformError> {
    let timeout = Duration::from_millis(def.timeout_ms);
    let work = async {
        match def.kind {
            TransformKind::Package => match set.packages.get(&def.name) {
                Some(implementation) => implementation
                    .execute(event, context)
                    .await
                    .map_err(|e| TransformError::failed(&def.name, e.to_string())),
                None => Err(TransformError::Unknown { transform: def.name.clone() }),
            },
            TransformKind::Script => script::run(def, &event, context).await,
        }
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            Err(TransformError::Timeout { transform: def.name.clone(), timeout_ms: def.timeout_ms })
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
