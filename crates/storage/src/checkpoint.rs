// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-source resume tokens.
//!
//! Each (module, source) pair gets one small JSON file under the module's
//! state directory. The token is opaque to the runtime; only the source that
//! produced it can interpret it. Writes go through a temp file and rename so
//! a crash never leaves a half-written checkpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(rename = "v")]
    version: u32,
    token: String,
    updated_at: DateTime<Utc>,
}

const CHECKPOINT_VERSION: u32 = 1;

/// Store of per-source checkpoints rooted at the runtime's modules directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self { root: modules_dir.into() }
    }

    /// Load the checkpoint for a source, or None if it has never polled.
    pub fn load(&self, module: &str, source: &str) -> Result<Option<String>, CheckpointError> {
        let path = self.path_for(module, source);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let file: CheckpointFile = serde_json::from_str(&data)?;
        Ok(Some(file.token))
    }

    /// Persist a checkpoint atomically.
    pub fn store(
        &self,
        module: &str,
        source: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        let path = self.path_for(module, source);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CheckpointFile {
            version: CHECKPOINT_VERSION,
            token: token.to_string(),
            updated_at: now,
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&file)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn clear(&self, module: &str, source: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(module, source);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Remove every checkpoint belonging to a module.
    pub fn clear_module(&self, module: &str) -> Result<(), CheckpointError> {
        let dir = self.module_dir(module).join("checkpoints");
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(module)
    }

    fn path_for(&self, module: &str, source: &str) -> PathBuf {
        self.module_dir(module).join("checkpoints").join(format!("{}.json", source))
    }
}

impl AsRef<Path> for CheckpointStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
