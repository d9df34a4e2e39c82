// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The poll scheduler.
//!
//! One long-lived task per poll-based source. First poll fires on module
//! activation, then at the configured cadence with up to 10% jitter so
//! sources sharing an interval don't herd. A source is never polled
//! concurrently with itself; ticks that land while a poll is still running
//! are skipped and logged. The circuit breaker is consulted every tick:
//! open circuits tick without calling into the source until the probe
//! deadline elapses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use sy_core::{CircuitPolicy, Clock, Phase, PhaseRecord, SourceHealth};
use sy_storage::CheckpointStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::connector::Source;
use crate::error::{ErrorSink, RuntimeError};
use crate::fanout::LoggerFanout;

/// Everything one source's poll task needs.
pub struct PollSpec<C: Clock> {
    pub module: String,
    pub source_name: String,
    pub source: Arc<dyn Source>,
    pub interval: Duration,
    pub health: Arc<Mutex<SourceHealth>>,
    pub bus: EventBus,
    pub checkpoints: CheckpointStore,
    pub fanout: LoggerFanout,
    pub errors: ErrorSink,
    pub policy: CircuitPolicy,
    pub clock: C,
    /// Module unload signal (itself derived from the runtime stop signal).
    pub cancel: CancellationToken,
}

struct ScheduledPoll {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Table of running poll tasks, keyed by (module, source).
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<(String, String), ScheduledPoll>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the poll task for a source. Replaces any previous entry for the
    /// same (module, source); callers unschedule first on reload.
    pub fn schedule<C: Clock>(&self, spec: PollSpec<C>) {
        let key = (spec.module.clone(), spec.source_name.clone());
        let cancel = spec.cancel.clone();
        let handle = tokio::spawn(poll_loop(spec));
        self.tasks.lock().insert(key, ScheduledPoll { cancel, handle });
    }

    pub fn is_scheduled(&self, module: &str, source: &str) -> bool {
        self.tasks.lock().contains_key(&(module.to_string(), source.to_string()))
    }

    /// Cancel one source's polling and wait for the in-flight poll (if any)
    /// to observe the cancellation.
    pub async fn unschedule(&self, module: &str, source: &str) {
        let entry = self.tasks.lock().remove(&(module.to_string(), source.to_string()));
        if let Some(entry) = entry {
            entry.cancel.cancel();
            let _ = entry.handle.await;
        }
    }

    /// Cancel every poll task belonging to a module and await them all.
    pub async fn unschedule_module(&self, module: &str) {
        let entries: Vec<ScheduledPoll> = {
            let mut tasks = self.tasks.lock();
            let keys: Vec<_> =
                tasks.keys().filter(|(m, _)| m == module).cloned().collect();
            keys.into_iter().filter_map(|key| tasks.remove(&key)).collect()
        };
        for entry in &entries {
            entry.cancel.cancel();
        }
        for entry in entries {
            let _ = entry.handle.await;
        }
    }
}

/// Interval with up to 10% of extra jitter.
fn jittered(interval: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=0.1);
    interval + interval.mul_f64(factor)
}

async fn poll_loop<C: Clock>(spec: PollSpec<C>) {
    // Fire-on-start: the first tick is due immediately.
    let mut next_tick = tokio::time::Instant::now();
    loop {
        tokio::select! {
            _ = spec.cancel.cancelled() => break,
            _ = tokio::time::sleep_until(next_tick) => {}
        }

        let now = spec.clock.utc_now();
        let (permitted, probing) = {
            let health = spec.health.lock();
            (health.poll_permitted(now), health.circuit_open)
        };
        if permitted {
            if probing {
                debug!(module = %spec.module, source = %spec.source_name, "circuit probe");
            }
            run_poll(&spec).await;
            if spec.cancel.is_cancelled() {
                break;
            }
        } else {
            debug!(
                module = %spec.module,
                source = %spec.source_name,
                "circuit open, poll skipped"
            );
        }

        // Advance the cadence; a poll that overran its interval consumes the
        // ticks it covered, one skip log per missed tick.
        next_tick += jittered(spec.interval);
        let now = tokio::time::Instant::now();
        let mut skipped = 0u32;
        while next_tick <= now {
            next_tick += jittered(spec.interval);
            skipped += 1;
        }
        if skipped > 0 {
            warn!(
                module = %spec.module,
                source = %spec.source_name,
                skipped,
                "poll still running at tick, skipped"
            );
        }
    }
}

/// One poll: load checkpoint, call the source, publish in order, persist the
/// checkpoint only after every event was accepted by the bus.
async fn run_poll<C: Clock>(spec: &PollSpec<C>) {
    let checkpoint = match spec.checkpoints.load(&spec.module, &spec.source_name) {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            spec.errors.report(RuntimeError::Checkpoint {
                module: spec.module.clone(),
                source_name: spec.source_name.clone(),
                message: e.to_string(),
            });
            None
        }
    };

    let outcome = tokio::select! {
        _ = spec.cancel.cancelled() => return,
        outcome = spec.source.poll(checkpoint) => outcome,
    };

    let now = spec.clock.utc_now();
    match outcome {
        Ok(poll) => {
            let count = poll.events.len() as u64;
            for event in &poll.events {
                spec.fanout
                    .emit(
                        Some(&spec.module),
                        PhaseRecord::for_event(Phase::SourceEmit, event, spec.clock.utc_now())
                            .with_module(&spec.module),
                    )
                    .await;
                if let Err(e) = spec.bus.publish(&spec.module, event) {
                    // Checkpoint stays put; the next poll re-reads from the
                    // prior cursor. This is the at-least-once edge.
                    spec.errors.report(RuntimeError::Publish(e));
                    return;
                }
            }

            if let Some(token) = poll.next_checkpoint.as_deref() {
                if let Err(e) = spec.checkpoints.store(&spec.module, &spec.source_name, token, now)
                {
                    spec.errors.report(RuntimeError::Checkpoint {
                        module: spec.module.clone(),
                        source_name: spec.source_name.clone(),
                        message: e.to_string(),
                    });
                }
            }

            let mut health = spec.health.lock();
            health.record_success(now);
            health.record_emitted(count);
        }
        Err(e) => {
            let message = e.to_string();
            let opened = spec.health.lock().record_failure(&message, now, &spec.policy);
            spec.errors.report(RuntimeError::SourcePoll {
                module: spec.module.clone(),
                source_name: spec.source_name.clone(),
                message,
            });
            if opened {
                warn!(
                    module = %spec.module,
                    source = %spec.source_name,
                    retry_after_ms = spec.policy.retry_after.as_millis() as u64,
                    "circuit opened"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
