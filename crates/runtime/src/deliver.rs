// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actor invocation.
//!
//! One attempt per matched route, under a hard timeout. There are no retries
//! on this path; at-least-once comes from journal replay after a restart,
//! with actor idempotency assumed.

use std::sync::Arc;
use std::time::Duration;

use sy_core::{Clock, Event, Phase, PhaseRecord, Route};

use crate::connector::{Actor, Delivery};
use crate::fanout::LoggerFanout;

/// Terminal outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Actor accepted synchronously.
    Delivered,
    /// Actor explicitly refused; terminal, not replayable.
    Rejected(String),
    /// Transport or actor-side failure; terminal for this attempt but
    /// replayable from the journal.
    Failed(String),
}

pub async fn deliver_event<C: Clock>(
    event: &Event,
    route: &Route,
    actor: Arc<dyn Actor>,
    timeout: Duration,
    fanout: &LoggerFanout,
    clock: &C,
    module: &str,
) -> DeliveryResult {
    let record = |phase: Phase| {
        PhaseRecord::for_event(phase, event, clock.utc_now())
            .with_module(module)
            .with_route(&route.name)
            .with_target(&route.then.actor)
    };

    fanout.emit(Some(module), record(Phase::DeliverAttempt)).await;
    let started = clock.now();

    let attempt = actor.deliver(event, &route.then.config, route.prompt_text.as_deref());
    let outcome = tokio::time::timeout(timeout, attempt).await;
    let elapsed_ms = clock.now().duration_since(started).as_millis() as u64;

    match outcome {
        Ok(Ok(Delivery::Delivered { .. })) => {
            fanout
                .emit(Some(module), record(Phase::DeliverSuccess).with_duration_ms(elapsed_ms))
                .await;
            DeliveryResult::Delivered
        }
        Ok(Ok(Delivery::Rejected { reason })) => {
            fanout
                .emit(
                    Some(module),
                    record(Phase::DeliverFailure)
                        .with_duration_ms(elapsed_ms)
                        .with_error(format!("rejected: {}", reason)),
                )
                .await;
            DeliveryResult::Rejected(reason)
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            fanout
                .emit(
                    Some(module),
                    record(Phase::DeliverFailure)
                        .with_duration_ms(elapsed_ms)
                        .with_error(&message),
                )
                .await;
            DeliveryResult::Failed(message)
        }
        Err(_) => {
            let message = format!("delivery timed out after {}ms", timeout.as_millis());
            fanout
                .emit(
                    Some(module),
                    record(Phase::DeliverFailure)
                        .with_duration_ms(elapsed_ms)
                        .with_error(&message),
                )
                .await;
            DeliveryResult::Failed(message)
        }
    }
}

#[cfg(test)]
#[path = "deliver_tests.rs"]
mod tests;
