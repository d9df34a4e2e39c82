// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! syd: the Switchyard daemon binary.

use std::process::ExitCode;
use std::sync::Arc;

use sy_daemon::{lifecycle, DaemonOptions, NullConnectorFactory};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let options = DaemonOptions::from_env();
    let layout = match options.resolve_layout() {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("syd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = layout.ensure_dirs() {
        eprintln!("syd: {}", e);
        return ExitCode::FAILURE;
    }

    // Daemon log goes to a file; RUST_LOG tunes verbosity.
    let file_appender = tracing_appender::rolling::never(
        layout.log_path.parent().unwrap_or(&layout.state_dir),
        layout
            .log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "daemon.log".to_string()),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let daemon = match lifecycle::startup(options, Arc::new(NullConnectorFactory)).await {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("syd: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // External tools wait on this line, then read the port file.
    println!("READY port={}", daemon.port());

    match daemon.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("syd: {}", e);
            ExitCode::FAILURE
        }
    }
}
