// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-module state: connectors, routes, health, lifecycle.
//!
//! A module instance owns no shared infrastructure. It is built from a
//! validated config plus resolved connector instances, initialized fail-fast,
//! and shut down best-effort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sy_core::{Clock, ModuleConfig, Route, SourceHealth};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::connector::{Actor, Logger, Source, Transform};
use crate::error::RuntimeError;
use crate::pipeline::TransformSet;
use crate::status::{ModuleStatus, ModuleSummary, SourceStatus};

/// Live connector instances for one module, keyed by declared name.
///
/// Produced by a `ConnectorFactory` (or handed in directly by tests); the
/// maps must cover every declaration in the module config. Package-kind
/// transform declarations need an entry in `transforms`; script-kind ones do
/// not.
#[derive(Default)]
pub struct ResolvedConnectors {
    pub sources: HashMap<String, Arc<dyn Source>>,
    pub actors: HashMap<String, Arc<dyn Actor>>,
    pub transforms: HashMap<String, Arc<dyn Transform>>,
    pub loggers: HashMap<String, Arc<dyn Logger>>,
}

/// Module lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Loading,
    Active,
    Unloading,
    Removed,
}

#[derive(Default)]
pub(crate) struct ModuleCounters {
    pub routed: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

pub struct ModuleInstance {
    config: ModuleConfig,
    connectors: ResolvedConnectors,
    transform_set: TransformSet,
    state: Mutex<ModuleState>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    /// One record per declared source, present from instantiation onward.
    health: HashMap<String, Arc<Mutex<SourceHealth>>>,
    cancel: CancellationToken,
    pub(crate) counters: ModuleCounters,
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance").field("name", &self.config.name).finish_non_exhaustive()
    }
}

impl ModuleInstance {
    /// Build an instance from a validated config.
    ///
    /// `parent_cancel` is the runtime's stop signal; the instance derives its
    /// unload signal from it so either tears down in-flight polls.
    pub fn new(
        config: ModuleConfig,
        connectors: ResolvedConnectors,
        parent_cancel: &CancellationToken,
    ) -> Self {
        let health = config
            .sources
            .iter()
            .map(|s| (s.name.clone(), Arc::new(Mutex::new(SourceHealth::default()))))
            .collect();
        let transform_set =
            TransformSet::new(config.transforms.iter().cloned(), connectors.transforms.clone());
        Self {
            config,
            connectors,
            transform_set,
            state: Mutex::new(ModuleState::Loading),
            started_at: Mutex::new(None),
            health,
            cancel: parent_cancel.child_token(),
            counters: ModuleCounters::default(),
        }
    }

    /// Initialize every connector, in declaration order, fail-fast.
    ///
    /// All-or-nothing: any error aborts the load before activation, so an
    /// active module always has every declared connector initialized.
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        let fail = |kind: &str, name: &str, message: String| RuntimeError::ModuleInit {
            module: self.config.name.clone(),
            message: format!("{} {}: {}", kind, name, message),
        };

        for def in &self.config.sources {
            let source = self
                .connectors
                .sources
                .get(&def.name)
                .ok_or_else(|| fail("source", &def.name, "no connector resolved".into()))?;
            source.init(&def.config).await.map_err(|e| fail("source", &def.name, e.to_string()))?;
        }
        for def in &self.config.actors {
            let actor = self
                .connectors
                .actors
                .get(&def.name)
                .ok_or_else(|| fail("actor", &def.name, "no connector resolved".into()))?;
            actor.init(&def.config).await.map_err(|e| fail("actor", &def.name, e.to_string()))?;
        }
        for def in &self.config.transforms {
            match self.connectors.transforms.get(&def.name) {
                Some(transform) => {
                    transform
                        .init(&def.config)
                        .await
                        .map_err(|e| fail("transform", &def.name, e.to_string()))?;
                }
                // Script transforms run out of process; only package kind
                // needs an in-process implementation.
                None if def.kind == sy_core::TransformKind::Script => {}
                None => {
                    return Err(fail("transform", &def.name, "no connector resolved".into()));
                }
            }
        }
        for def in &self.config.loggers {
            let logger = self
                .connectors
                .loggers
                .get(&def.name)
                .ok_or_else(|| fail("logger", &def.name, "no connector resolved".into()))?;
            logger.init(&def.config).await.map_err(|e| fail("logger", &def.name, e.to_string()))?;
        }
        Ok(())
    }

    /// Mark active and record the start time. Scheduling begins after this.
    pub fn activate<C: Clock>(&self, clock: &C) {
        *self.state.lock() = ModuleState::Active;
        *self.started_at.lock() = Some(clock.utc_now());
    }

    /// Mark unloading and signal cancellation to the module's poll tasks.
    pub fn deactivate(&self) {
        *self.state.lock() = ModuleState::Unloading;
        self.cancel.cancel();
    }

    /// Shut down every connector, tolerating individual failures.
    ///
    /// Visits all four tables regardless of errors; each connector receives
    /// exactly one shutdown. Idempotent via the Removed state.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if *state == ModuleState::Removed {
                return;
            }
            *state = ModuleState::Removed;
        }

        let module = self.config.name.as_str();
        for (name, source) in &self.connectors.sources {
            if let Err(e) = source.shutdown().await {
                warn!(module, source = %name, "source shutdown failed: {}", e);
            }
        }
        for (name, actor) in &self.connectors.actors {
            if let Err(e) = actor.shutdown().await {
                warn!(module, actor = %name, "actor shutdown failed: {}", e);
            }
        }
        for (name, transform) in &self.connectors.transforms {
            if let Err(e) = transform.shutdown().await {
                warn!(module, transform = %name, "transform shutdown failed: {}", e);
            }
        }
        for (name, logger) in &self.connectors.loggers {
            if let Err(e) = logger.flush().await {
                warn!(module, logger = %name, "logger flush failed: {}", e);
            }
            if let Err(e) = logger.shutdown().await {
                warn!(module, logger = %name, "logger shutdown failed: {}", e);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn routes(&self) -> &[Route] {
        &self.config.routes
    }

    pub fn state(&self) -> ModuleState {
        *self.state.lock()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn source(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.connectors.sources.get(name).cloned()
    }

    pub fn actor(&self, name: &str) -> Option<Arc<dyn Actor>> {
        self.connectors.actors.get(name).cloned()
    }

    pub fn loggers(&self) -> Vec<Arc<dyn Logger>> {
        self.config
            .loggers
            .iter()
            .filter_map(|def| self.connectors.loggers.get(&def.name).cloned())
            .collect()
    }

    pub fn transform_set(&self) -> &TransformSet {
        &self.transform_set
    }

    /// Health record for one source. Present for every declared source.
    pub fn health(&self, source: &str) -> Option<Arc<Mutex<SourceHealth>>> {
        self.health.get(source).cloned()
    }

    /// Consistent snapshot of every source's health.
    pub fn health_snapshot(&self) -> Vec<(String, SourceHealth)> {
        let mut sources: Vec<(String, SourceHealth)> =
            self.health.iter().map(|(name, h)| (name.clone(), h.lock().clone())).collect();
        sources.sort_by(|a, b| a.0.cmp(&b.0));
        sources
    }

    pub fn status(&self, now: DateTime<Utc>) -> ModuleStatus {
        let started_at = *self.started_at.lock();
        let uptime_ms = started_at
            .map(|s| (now - s).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        ModuleStatus {
            name: self.config.name.clone(),
            state: self.state(),
            started_at,
            uptime_ms,
            routes: self.config.routes.len(),
            events_routed: self.counters.routed.load(Ordering::Relaxed),
            deliveries: self.counters.delivered.load(Ordering::Relaxed),
            delivery_failures: self.counters.failed.load(Ordering::Relaxed),
            sources: self
                .health_snapshot()
                .into_iter()
                .map(|(name, health)| SourceStatus { name, health })
                .collect(),
        }
    }

    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            name: self.config.name.clone(),
            state: self.state(),
            sources: self.config.sources.len(),
            routes: self.config.routes.len(),
        }
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
