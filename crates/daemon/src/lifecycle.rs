// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, serve, graceful shutdown.
//!
//! Startup order matters: lock first (prevents two daemons racing on one
//! state dir), then runtime construction with journal recovery, and the
//! listener bind last so a half-started daemon never advertises a port.

use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use sy_runtime::{ConnectorFactory, Runtime, RuntimeError, RuntimeOptions};
use sy_storage::StateLayout;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::http::{self, AppState};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no per-user state directory available")]
    NoStateDir,

    #[error("another instance holds the state lock: {0}")]
    LockFailed(std::io::Error),

    #[error("failed to bind control listener on {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Explicit state directory; `None` discovers the per-user default.
    pub state_dir: Option<PathBuf>,
    /// Control listener address. Port 0 picks an ephemeral port, recorded in
    /// the port file either way.
    pub bind: SocketAddr,
    /// Journal-backed bus.
    pub durable: bool,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self { state_dir: None, bind: ([127, 0, 0, 1], 0).into(), durable: false }
    }
}

impl DaemonOptions {
    /// Read options from `SWITCHYARD_STATE_DIR`, `SWITCHYARD_PORT`, and
    /// `SWITCHYARD_DURABLE`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(dir) = std::env::var("SWITCHYARD_STATE_DIR") {
            if !dir.is_empty() {
                options.state_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(port) = std::env::var("SWITCHYARD_PORT").ok().and_then(|p| p.parse().ok()) {
            options.bind = ([127, 0, 0, 1], port).into();
        }
        options.durable = std::env::var("SWITCHYARD_DURABLE").is_ok_and(|v| v == "1");
        options
    }

    pub fn resolve_layout(&self) -> Result<StateLayout, LifecycleError> {
        match &self.state_dir {
            Some(dir) => Ok(StateLayout::new(dir)),
            None => StateLayout::discover().ok_or(LifecycleError::NoStateDir),
        }
    }
}

/// A started daemon, ready to serve.
pub struct Daemon {
    runtime: Arc<Runtime>,
    layout: StateLayout,
    factory: Arc<dyn ConnectorFactory>,
    shutdown: Arc<Notify>,
    listener: Option<TcpListener>,
    port: u16,
    // NOTE(lifetime): held to keep the exclusive state lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").field("port", &self.port).finish_non_exhaustive()
    }
}

/// Start the daemon: lock, recover, bind, record the port.
pub async fn startup(
    options: DaemonOptions,
    factory: Arc<dyn ConnectorFactory>,
) -> Result<Daemon, LifecycleError> {
    let layout = options.resolve_layout()?;
    match startup_inner(options, factory, &layout).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if the lock is held elsewhere. Those files
            // belong to the running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_files(&layout);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    options: DaemonOptions,
    factory: Arc<dyn ConnectorFactory>,
    layout: &StateLayout,
) -> Result<Daemon, LifecycleError> {
    layout.ensure_dirs()?;

    // Acquire the lock before touching anything else. OpenOptions without
    // truncate so a failed attempt can't wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&layout.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    std::fs::write(&layout.pid_path, format!("{}\n", std::process::id()))?;

    let mut runtime_options = RuntimeOptions::new(&layout.modules_dir);
    if options.durable {
        runtime_options = runtime_options.durable(&layout.wal_path);
    }
    let runtime = Arc::new(Runtime::new(runtime_options)?);
    runtime.start().await;

    // Bind last, so startup refuses to come up if the port is taken by
    // another instance.
    let listener = TcpListener::bind(options.bind)
        .await
        .map_err(|e| LifecycleError::BindFailed(options.bind, e))?;
    let port = listener.local_addr()?.port();
    std::fs::write(&layout.port_path, format!("{}\n", port))?;
    runtime.set_http_port(Some(port));
    info!(port, state_dir = %layout.state_dir.display(), "daemon started");

    Ok(Daemon {
        runtime,
        layout: layout.clone(),
        factory,
        shutdown: Arc::new(Notify::new()),
        listener: Some(listener),
        port,
        lock_file,
    })
}

impl Daemon {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Serve the control surface until a shutdown signal, then stop the
    /// runtime and remove the port/pid artifacts.
    pub async fn run(mut self) -> Result<(), LifecycleError> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Ok(()),
        };

        // Drain runtime errors into the daemon log.
        if let Some(mut errors) = self.runtime.take_errors() {
            tokio::spawn(async move {
                while let Some(error) = errors.recv().await {
                    warn!(error = %error, "runtime error");
                }
            });
        }

        let state = AppState {
            runtime: Arc::clone(&self.runtime),
            factory: Arc::clone(&self.factory),
            shutdown: Arc::clone(&self.shutdown),
        };
        let app = http::router(state);

        let shutdown = Arc::clone(&self.shutdown);
        let cancel = self.runtime.cancel_token().clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.notified() => info!("shutdown requested"),
                    _ = cancel.cancelled() => info!("runtime stop observed"),
                    _ = terminate_signal() => info!("termination signal"),
                }
            })
            .await?;

        self.runtime.stop().await;
        self.finalize();
        Ok(())
    }

    /// Remove the port and pid artifacts. The lock releases on drop.
    pub fn finalize(&self) {
        self.runtime.set_http_port(None);
        cleanup_files(&self.layout);
        info!("daemon stopped");
    }
}

fn cleanup_files(layout: &StateLayout) {
    let _ = std::fs::remove_file(&layout.port_path);
    let _ = std::fs::remove_file(&layout.pid_path);
}

async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                // Fall back to ctrl-c only.
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = term.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
