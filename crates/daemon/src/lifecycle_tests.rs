// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::NullConnectorFactory;
use tempfile::TempDir;

fn options(state: &TempDir) -> DaemonOptions {
    DaemonOptions {
        state_dir: Some(state.path().join("state")),
        bind: ([127, 0, 0, 1], 0).into(),
        durable: false,
    }
}

#[tokio::test]
async fn startup_writes_pid_and_port_artifacts() {
    let state = TempDir::new().unwrap();
    let daemon = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap();

    let layout = daemon.layout();
    let pid: u32 =
        std::fs::read_to_string(&layout.pid_path).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());

    let port: u16 =
        std::fs::read_to_string(&layout.port_path).unwrap().trim().parse().unwrap();
    assert_eq!(port, daemon.port());
    assert_ne!(port, 0);

    assert_eq!(daemon.runtime().status().http_port, Some(port));
}

#[tokio::test]
async fn second_instance_fails_on_the_lock() {
    let state = TempDir::new().unwrap();
    let first = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap();

    let err = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));

    // The loser must not have clobbered the winner's artifacts.
    let pid: u32 =
        std::fs::read_to_string(&first.layout().pid_path).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());
    assert!(first.layout().port_path.exists());
}

#[tokio::test]
async fn bind_failure_refuses_startup_and_cleans_up() {
    let state = TempDir::new().unwrap();

    // Occupy a port, then ask the daemon for it.
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = blocker.local_addr().unwrap();

    let mut opts = options(&state);
    opts.bind = taken;
    let err = startup(opts, Arc::new(NullConnectorFactory)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::BindFailed(_, _)));

    // Startup failure removed its half-written artifacts.
    let layout = StateLayout::new(state.path().join("state"));
    assert!(!layout.port_path.exists());
    assert!(!layout.pid_path.exists());
}

#[tokio::test]
async fn finalize_removes_artifacts() {
    let state = TempDir::new().unwrap();
    let daemon = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap();
    let layout = daemon.layout().clone();

    daemon.finalize();

    assert!(!layout.port_path.exists());
    assert!(!layout.pid_path.exists());
    // The state dir itself survives for the next start.
    assert!(layout.state_dir.is_dir());
}

#[tokio::test]
async fn lock_releases_when_the_daemon_drops() {
    let state = TempDir::new().unwrap();
    {
        let daemon = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap();
        daemon.finalize();
    }
    // Same state dir is startable again.
    let again = startup(options(&state), Arc::new(NullConnectorFactory)).await.unwrap();
    assert_ne!(again.port(), 0);
}

#[test]
fn options_from_env_defaults_to_loopback_ephemeral() {
    let options = DaemonOptions::default();
    assert_eq!(options.bind.ip().to_string(), "127.0.0.1");
    assert_eq!(options.bind.port(), 0);
    assert!(!options.durable);
}
