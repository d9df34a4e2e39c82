// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control surface.
//!
//! One loopback listener multiplexes webhook ingress and the module control
//! API. Errors come back as JSON `{error}` bodies with standard status codes.
//! No credentials over the wire; loopback-only trust.

mod control;
mod webhook;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sy_runtime::{ConnectorFactory, Runtime, RuntimeError};
use tokio::sync::Notify;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Runtime>,
    /// Resolves module configs to connector instances on load/reload.
    pub factory: Arc<dyn ConnectorFactory>,
    /// Fired by `POST /control/shutdown` to begin the graceful stop.
    pub shutdown: Arc<Notify>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/:source_id", post(webhook::ingress))
        .route("/control/status", get(control::status))
        .route("/control/module/list", get(control::module_list))
        .route("/control/module/status/:name", get(control::module_status))
        .route("/control/module/load", post(control::module_load))
        .route("/control/module/unload", post(control::module_unload))
        .route("/control/module/reload", post(control::module_reload))
        .route("/control/shutdown", post(control::shutdown))
        .with_state(state)
}

/// Runtime errors mapped onto the wire.
pub struct ApiError(RuntimeError);

impl From<RuntimeError> for ApiError {
    fn from(error: RuntimeError) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            RuntimeError::ModuleNotFound(_) | RuntimeError::WebhookUnknownSource(_) => {
                StatusCode::NOT_FOUND
            }
            RuntimeError::ModuleAlreadyLoaded(_) | RuntimeError::WebhookConflict(_) => {
                StatusCode::CONFLICT
            }
            RuntimeError::Config(_) | RuntimeError::ModuleInit { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
