// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of the runtime's state directory.
//!
//! One daemon serves all modules for a user; everything lives under a single
//! state directory (`$XDG_STATE_HOME/switchyard` or the platform equivalent).

use std::path::PathBuf;

/// Resolved paths for one runtime's persisted state.
#[derive(Debug, Clone)]
pub struct StateLayout {
    /// Root state directory.
    pub state_dir: PathBuf,
    /// PID of the running daemon.
    pub pid_path: PathBuf,
    /// Exclusive lock held for the daemon's lifetime.
    pub lock_path: PathBuf,
    /// Bound control port, written when HTTP comes up, for external tools.
    pub port_path: PathBuf,
    /// Daemon's own log file.
    pub log_path: PathBuf,
    /// Durable event journal.
    pub wal_path: PathBuf,
    /// Per-module state (checkpoints, snapshots).
    pub modules_dir: PathBuf,
}

impl StateLayout {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            pid_path: state_dir.join("daemon.pid"),
            lock_path: state_dir.join("daemon.lock"),
            port_path: state_dir.join("control.port"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("events.wal"),
            modules_dir: state_dir.join("modules"),
            state_dir,
        }
    }

    /// Layout under the per-user state directory.
    pub fn discover() -> Option<Self> {
        let base = dirs::state_dir().or_else(dirs::data_local_dir)?;
        Some(Self::new(base.join("switchyard")))
    }

    /// Create every directory the layout needs.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        if let Some(parent) = self.wal_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.modules_dir)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
