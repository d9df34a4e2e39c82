// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-source health tracking and circuit breaking.
//!
//! Each poll-based source carries one of these records. The scheduler task
//! that owns the source's polls is the only writer; everyone else reads
//! snapshots.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker tuning, shared by every source in a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    /// Consecutive errors required to open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a single probe poll.
    pub retry_after: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self { failure_threshold: 5, retry_after: Duration::from_secs(5 * 60) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Mutable health record for one poll-based source.
///
/// Webhook-only sources never hold one of these; webhook handler errors are
/// logged but do not open a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub status: HealthStatus,
    pub consecutive_errors: u32,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_events_emitted: u64,
    pub circuit_open: bool,
    pub circuit_retry_deadline: Option<DateTime<Utc>>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_errors: 0,
            last_successful_poll: None,
            last_error: None,
            total_events_emitted: 0,
            circuit_open: false,
            circuit_retry_deadline: None,
        }
    }
}

impl SourceHealth {
    /// A poll (or probe) completed successfully.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = HealthStatus::Healthy;
        self.consecutive_errors = 0;
        self.last_successful_poll = Some(now);
        self.last_error = None;
        self.circuit_open = false;
        self.circuit_retry_deadline = None;
    }

    /// A poll (or probe) failed. Returns true when this failure opened the
    /// circuit (first transition only; an already-open circuit reschedules
    /// its probe without reporting a fresh trip).
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        policy: &CircuitPolicy,
    ) -> bool {
        let was_open = self.circuit_open;
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error.into());

        if self.consecutive_errors >= policy.failure_threshold {
            self.status = HealthStatus::Unhealthy;
            self.circuit_open = true;
            self.circuit_retry_deadline = checked_deadline(now, policy.retry_after);
            !was_open
        } else {
            self.status = HealthStatus::Degraded;
            false
        }
    }

    /// Count events published from a successful poll.
    pub fn record_emitted(&mut self, count: u64) {
        self.total_events_emitted = self.total_events_emitted.saturating_add(count);
    }

    /// Whether an open circuit has reached its probe deadline.
    pub fn circuit_ready(&self, now: DateTime<Utc>) -> bool {
        self.circuit_open
            && self.circuit_retry_deadline.is_none_or(|deadline| now >= deadline)
    }

    /// Whether the scheduler may call into the source on this tick.
    ///
    /// Closed circuit: always. Open circuit: only once the probe deadline
    /// has elapsed.
    pub fn poll_permitted(&self, now: DateTime<Utc>) -> bool {
        !self.circuit_open || self.circuit_ready(now)
    }
}

fn checked_deadline(now: DateTime<Utc>, after: Duration) -> Option<DateTime<Utc>> {
    ChronoDuration::from_std(after).ok().and_then(|d| now.checked_add_signed(d))
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
