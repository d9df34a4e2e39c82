// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration error taxonomy shared across crates.
//!
//! Runtime-layer errors (module lifecycle, polling, delivery) live in
//! `sy-runtime`; storage errors in `sy-storage`. This module only carries the
//! errors that configuration types themselves can produce.

use thiserror::Error;

/// Invalid or missing required option. Fatal for the affected load or start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingOption(String),

    #[error("invalid value for {option}: {reason}")]
    InvalidValue { option: String, reason: String },

    #[error("duplicate name {name:?} in {section}")]
    DuplicateName { section: String, name: String },

    #[error("route {route:?} references unknown {kind} {name:?}")]
    UnknownReference { route: String, kind: &'static str, name: String },
}

impl ConfigError {
    pub fn missing(option: impl Into<String>) -> Self {
        ConfigError::MissingOption(option.into())
    }

    pub fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue { option: option.into(), reason: reason.into() }
    }
}
