// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use sy_core::EventKind;

fn context() -> TransformContext {
    TransformContext {
        source: "gh".to_string(),
        target: "agent".to_string(),
        event_type: "resource.changed".to_string(),
        route_name: "r1".to_string(),
        module_name: "eng".to_string(),
    }
}

fn event() -> Event {
    let mut event = Event::new("gh", EventKind::ResourceChanged, Utc::now());
    event.payload.insert("n".to_string(), serde_json::json!(1));
    event
}

fn script_def(command: &str) -> TransformDef {
    TransformDef::script("t", command)
}

#[tokio::test]
async fn identity_script_passes_event_through() {
    let outcome = run(&script_def("cat"), &event(), &context()).await.unwrap();
    match outcome {
        TransformOutcome::Next(next) => assert_eq!(next.payload["n"], serde_json::json!(1)),
        other => panic!("expected Next, got {:?}", other),
    }
}

#[tokio::test]
async fn successor_keeps_input_trace_id() {
    let input = event();
    // Script rewrites the trace id; the runner restores it.
    let cmd = r#"sed 's/trc_[a-f0-9]*/trc_hijacked/'"#;
    let outcome = run(&script_def(cmd), &input, &context()).await.unwrap();
    match outcome {
        TransformOutcome::Next(next) => assert_eq!(next.trace_id, input.trace_id),
        other => panic!("expected Next, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_stdout_on_success_is_drop() {
    let outcome = run(&script_def("cat > /dev/null"), &event(), &context()).await.unwrap();
    assert!(matches!(outcome, TransformOutcome::Drop));
}

#[tokio::test]
async fn exit_one_is_drop() {
    let outcome = run(&script_def("cat > /dev/null; exit 1"), &event(), &context()).await.unwrap();
    assert!(matches!(outcome, TransformOutcome::Drop));
}

#[tokio::test]
async fn exit_two_or_higher_is_error() {
    let err = run(&script_def("echo nope >&2; exit 3"), &event(), &context())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("exited 3"), "unexpected error: {}", message);
    assert!(message.contains("nope"), "stderr not captured: {}", message);
}

#[tokio::test]
async fn invalid_stdout_event_is_error() {
    let err = run(&script_def("echo not-json"), &event(), &context()).await.unwrap_err();
    assert!(err.to_string().contains("invalid event"));
}

#[tokio::test]
async fn missing_command_is_error() {
    let mut def = script_def("cat");
    def.config.remove("command");
    let err = run(&def, &event(), &context()).await.unwrap_err();
    assert!(err.to_string().contains("requires a command"));
}

#[tokio::test]
async fn environment_carries_invocation_context() {
    let input = event();
    let cmd = r#"cat > /dev/null; [ "$SOURCE" = gh ] && [ "$TARGET" = agent ] && [ "$EVENT_TYPE" = resource.changed ] && [ "$ROUTE" = r1 ] && [ -n "$EVENT_ID" ] || exit 9; exit 1"#;
    // Exit 1 (drop) only reachable when every variable checked out.
    let outcome = run(&script_def(cmd), &input, &context()).await.unwrap();
    assert!(matches!(outcome, TransformOutcome::Drop));
}
