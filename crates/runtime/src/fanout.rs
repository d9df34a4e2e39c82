// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logger fan-out.
//!
//! One component receives every phase record and broadcasts it to the owning
//! module's logger roster, mirroring to `tracing` for operator diagnostics.
//! Logger failures are logged and swallowed; observability must never stall
//! the event path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sy_core::PhaseRecord;
use tracing::{debug, warn};

use crate::connector::Logger;

#[derive(Clone, Default)]
pub struct LoggerFanout {
    rosters: Arc<Mutex<HashMap<String, Vec<Arc<dyn Logger>>>>>,
}

impl LoggerFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a module's loggers. Replaces any previous roster for the name.
    pub fn attach(&self, module: &str, loggers: Vec<Arc<dyn Logger>>) {
        self.rosters.lock().insert(module.to_string(), loggers);
    }

    /// Drop a module's roster. The module instance still owns the loggers
    /// and shuts them down itself.
    pub fn detach(&self, module: &str) {
        self.rosters.lock().remove(module);
    }

    /// Broadcast one record. `module = None` (system phases) reaches every
    /// roster.
    pub async fn emit(&self, module: Option<&str>, record: PhaseRecord) {
        debug!(
            phase = %record.phase,
            event_id = record.event_id.as_ref().map(|id| id.as_str()),
            module = module,
            route = record.route.as_deref(),
            error = record.error.as_deref(),
            "phase"
        );

        // Snapshot under the lock, log outside it.
        let targets: Vec<Arc<dyn Logger>> = {
            let rosters = self.rosters.lock();
            match module {
                Some(name) => rosters.get(name).cloned().unwrap_or_default(),
                None => rosters.values().flatten().cloned().collect(),
            }
        };

        for logger in targets {
            if let Err(e) = logger.log(&record).await {
                warn!(phase = %record.phase, "logger failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
