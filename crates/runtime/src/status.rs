// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status snapshot types for the control surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sy_core::SourceHealth;

use crate::module::ModuleState;

/// One source's health as reported in status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    #[serde(flatten)]
    pub health: SourceHealth,
}

/// Full per-module status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_ms: u64,
    pub routes: usize,
    pub events_routed: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub sources: Vec<SourceStatus>,
}

/// One line of `module list` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub state: ModuleState,
    pub sources: usize,
    pub routes: usize,
}

/// Runtime-wide snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub pid: u32,
    pub uptime_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    pub durable: bool,
    /// Events published but not yet acked.
    pub pending_events: usize,
    pub modules: Vec<ModuleStatus>,
}
