// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sy_runtime::test_support::ScriptedConnectorFactory;
use sy_runtime::RuntimeOptions;
use tempfile::TempDir;
use tower::ServiceExt;

struct Rig {
    app: Router,
    runtime: Arc<Runtime>,
    factory: Arc<ScriptedConnectorFactory>,
    shutdown: Arc<Notify>,
    _state: TempDir,
}

async fn rig() -> Rig {
    let state = TempDir::new().unwrap();
    let runtime =
        Arc::new(Runtime::new(RuntimeOptions::new(state.path().join("modules"))).unwrap());
    runtime.start().await;
    let factory = ScriptedConnectorFactory::new();
    let shutdown = Arc::new(Notify::new());
    let app = router(AppState {
        runtime: Arc::clone(&runtime),
        factory: factory.clone(),
        shutdown: Arc::clone(&shutdown),
    });
    Rig { app, runtime, factory, shutdown, _state: state }
}

fn module_body(name: &str) -> Value {
    json!({
        "module": {
            "name": name,
            "sources": [{"name": "gh", "kind": "scripted"}],
            "actors": [{"name": "agent", "kind": "recording"}],
            "routes": [{
                "name": "r1",
                "when": {"source": "gh", "events": ["resource.changed"]},
                "then": {"actor": "agent"},
            }],
        }
    })
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn status_reports_pid_and_modules() {
    let rig = rig().await;
    let (status, body) = request(&rig.app, "GET", "/control/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pid"], json!(std::process::id()));
    assert_eq!(body["modules"], json!([]));
}

#[tokio::test]
async fn load_then_list_then_status() {
    let rig = rig().await;

    let (status, body) =
        request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("eng"));
    assert_eq!(body["state"], json!("active"));

    let (status, body) = request(&rig.app, "GET", "/control/module/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modules"][0]["name"], json!("eng"));

    let (status, body) = request(&rig.app, "GET", "/control/module/status/eng", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"][0]["name"], json!("gh"));
    assert_eq!(body["sources"][0]["status"], json!("healthy"));
}

#[tokio::test]
async fn duplicate_load_is_conflict() {
    let rig = rig().await;
    request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;

    let (status, body) =
        request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap_or_default().contains("already loaded"));
}

#[tokio::test]
async fn invalid_module_config_is_bad_request() {
    let rig = rig().await;
    let mut body = module_body("eng");
    body["module"]["routes"][0]["then"]["actor"] = json!("ghost");

    let (status, body) = request(&rig.app, "POST", "/control/module/load", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("ghost"));
}

#[tokio::test]
async fn unknown_module_status_is_not_found() {
    let rig = rig().await;
    let (status, body) = request(&rig.app, "GET", "/control/module/status/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn unload_returns_ok_and_frees_the_name() {
    let rig = rig().await;
    request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;

    let (status, body) =
        request(&rig.app, "POST", "/control/module/unload", Some(json!({"name": "eng"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (status, _) =
        request(&rig.app, "POST", "/control/module/unload", Some(json!({"name": "eng"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_without_body_reuses_the_loaded_config() {
    let rig = rig().await;
    request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;

    let (status, body) =
        request(&rig.app, "POST", "/control/module/reload", Some(json!({"name": "eng"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], json!("active"));

    // Still exactly one registered module.
    let (_, body) = request(&rig.app, "GET", "/control/module/list", None).await;
    assert_eq!(body["modules"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn reload_of_unknown_module_is_not_found() {
    let rig = rig().await;
    let (status, _) =
        request(&rig.app, "POST", "/control/module/reload", Some(json!({"name": "ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_ingress_routes_to_the_source_and_injects() {
    let rig = rig().await;

    // Load a module whose source is webhook-capable.
    let mut body = module_body("eng");
    body["module"]["sources"][0]["config"] = json!({"webhook": true});
    let (status, _) = request(&rig.app, "POST", "/control/module/load", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let source = rig.factory.source("eng", "gh").unwrap();
    let event = sy_runtime::test_support::test_event("gh", "resource.changed");
    source.set_webhook_events(vec![event]);

    let (status, body) =
        request(&rig.app, "POST", "/webhook/gh", Some(json!({"action": "opened"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));

    // The injected event flowed through routing to the actor.
    let actor = rig.factory.actor("eng", "agent").unwrap();
    for _ in 0..200 {
        if actor.delivery_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(actor.delivery_count(), 1);
}

#[tokio::test]
async fn webhook_for_unknown_source_is_not_found() {
    let rig = rig().await;
    let (status, body) = request(&rig.app, "POST", "/webhook/ghost", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn webhook_rejects_non_post() {
    let rig = rig().await;
    let (status, _) = request(&rig.app, "GET", "/webhook/gh", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn shutdown_acknowledges_then_signals() {
    let rig = rig().await;

    let notified = {
        let shutdown = Arc::clone(&rig.shutdown);
        tokio::spawn(async move { shutdown.notified().await })
    };

    let (status, body) = request(&rig.app, "POST", "/control/shutdown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    tokio::time::timeout(std::time::Duration::from_secs(1), notified)
        .await
        .expect("shutdown was not signalled")
        .unwrap();
    // The runtime itself is stopped by the serve loop, not the handler.
    assert!(!rig.runtime.is_stopping());
}

#[tokio::test]
async fn module_load_resolves_connectors_through_the_factory() {
    let rig = rig().await;
    request(&rig.app, "POST", "/control/module/load", Some(module_body("eng"))).await;

    assert!(rig.factory.source("eng", "gh").is_some());
    assert!(rig.factory.actor("eng", "agent").is_some());
}
