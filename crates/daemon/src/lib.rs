// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sy-daemon: The Switchyard daemon
//!
//! Hosts the runtime behind a loopback HTTP listener: webhook ingress for
//! push sources plus the module control API.

pub mod http;
pub mod lifecycle;

use sy_core::{ConfigError, ModuleConfig, TransformKind};
use sy_runtime::{ConnectorFactory, ResolvedConnectors, RuntimeError};

pub use http::{ApiError, AppState};
pub use lifecycle::{startup, Daemon, DaemonOptions, LifecycleError};

/// Factory for a daemon with no connector packages registered.
///
/// Embedders provide their own [`ConnectorFactory`]; the bare `syd` binary
/// can only load modules that declare no connectors.
pub struct NullConnectorFactory;

impl ConnectorFactory for NullConnectorFactory {
    fn resolve(&self, config: &ModuleConfig) -> Result<ResolvedConnectors, RuntimeError> {
        let wanted = config
            .sources
            .iter()
            .map(|s| s.kind.as_str())
            .chain(config.actors.iter().map(|a| a.kind.as_str()))
            .chain(config.loggers.iter().map(|l| l.kind.as_str()))
            .chain(
                config
                    .transforms
                    .iter()
                    .filter(|t| t.kind == TransformKind::Package)
                    .map(|t| t.name.as_str()),
            )
            .next();
        match wanted {
            Some(kind) => Err(RuntimeError::Config(ConfigError::invalid(
                "connectors",
                format!("no connector package registered for kind {:?}", kind),
            ))),
            None => Ok(ResolvedConnectors::default()),
        }
    }
}
