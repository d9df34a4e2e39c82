// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script-kind transform execution.
//!
//! One process invocation per event. The event arrives as JSON on stdin and
//! the invocation context rides in the environment. Exit code contract:
//!
//! - `0` with non-empty stdout: stdout is the successor event
//! - `0` with empty stdout, or `1`: drop
//! - `2` and above, or killed by signal: transform error
//!
//! Timeouts are enforced by the pipeline; `kill_on_drop` reaps the child
//! when the invocation future is cancelled.

use std::process::Stdio;

use sy_core::{Event, TransformDef};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::connector::{TransformContext, TransformOutcome};
use crate::pipeline::TransformError;

/// Exit code a script uses to drop the event.
pub const DROP_EXIT_CODE: i32 = 1;

pub(crate) async fn run(
    def: &TransformDef,
    event: &Event,
    context: &TransformContext,
) -> Result<TransformOutcome, TransformError> {
    let command = def
        .config
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TransformError::failed(&def.name, "script transform requires a command"))?;

    let input = serde_json::to_vec(event)
        .map_err(|e| TransformError::failed(&def.name, format!("event encoding failed: {}", e)))?;

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("SOURCE", &context.source)
        .env("TARGET", &context.target)
        .env("EVENT_TYPE", &context.event_type)
        .env("EVENT_ID", event.id.as_str())
        .env("ROUTE", &context.route_name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TransformError::failed(&def.name, format!("spawn failed: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(&input)
            .await
            .map_err(|e| TransformError::failed(&def.name, format!("stdin write failed: {}", e)))?;
        // Close stdin so the script sees EOF.
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| TransformError::failed(&def.name, format!("wait failed: {}", e)))?;

    std::fs::write("/tmp/diag.txt", format!("status={:?} stdout={:?}", output.status.code(), String::from_utf8_lossy(&output.stdout))).ok();
    match output.status.code() {
        Some(0) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let trimmed = stdout.trim();
            if trimmed.is_empty() {
                return Ok(TransformOutcome::Drop);
            }
            let mut successor: Event = serde_json::from_str(trimmed).map_err(|e| {
                let err = TransformError::failed(&def.name, format!("script emitted invalid event: {}", e));
                eprintln!("DIAG: {}", err);
                err
            })?;
            // Trace continuity is the runtime's invariant, not the script's.
            successor.trace_id = event.trace_id;
            Ok(TransformOutcome::Next(successor))
        }
        Some(DROP_EXIT_CODE) => Ok(TransformOutcome::Drop),
        Some(code) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(TransformError::failed(
                &def.name,
                format!("script exited {}: {}", code, stderr.trim()),
            ))
        }
        None => Err(TransformError::failed(&def.name, "script killed by signal")),
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
