// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module control API handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sy_core::ModuleConfig;
use sy_runtime::{ModuleStatus, ModuleSummary, RuntimeStatus};
use tracing::info;

use super::{ApiError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct ModuleListResponse {
    pub modules: Vec<ModuleSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Resolved module configuration. Package discovery happens client-side;
    /// the daemon resolves connector kinds through its registered factory.
    pub module: ModuleConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnloadRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadRequest {
    pub name: String,
    /// Replacement configuration; omitted keeps the loaded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<RuntimeStatus> {
    Json(state.runtime.status())
}

pub async fn module_list(State(state): State<AppState>) -> Json<ModuleListResponse> {
    Json(ModuleListResponse { modules: state.runtime.module_summaries() })
}

pub async fn module_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ModuleStatus>, ApiError> {
    Ok(Json(state.runtime.module_status(&name)?))
}

pub async fn module_load(
    State(state): State<AppState>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<ModuleStatus>, ApiError> {
    request.module.validate().map_err(sy_runtime::RuntimeError::from)?;
    let connectors = state.factory.resolve(&request.module)?;
    let status = state.runtime.load_module(request.module, connectors).await?;
    Ok(Json(status))
}

pub async fn module_unload(
    State(state): State<AppState>,
    Json(request): Json<UnloadRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.runtime.unload_module(&request.name).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn module_reload(
    State(state): State<AppState>,
    Json(request): Json<ReloadRequest>,
) -> Result<Json<ModuleStatus>, ApiError> {
    let config = match request.module {
        Some(config) => config,
        None => state
            .runtime
            .module_config(&request.name)
            .ok_or_else(|| sy_runtime::RuntimeError::ModuleNotFound(request.name.clone()))?,
    };
    config.validate().map_err(sy_runtime::RuntimeError::from)?;
    let connectors = state.factory.resolve(&config)?;
    let status = state.runtime.reload_module(&request.name, Some(config), connectors).await?;
    Ok(Json(status))
}

/// Acknowledge, then initiate the graceful stop.
pub async fn shutdown(State(state): State<AppState>) -> Json<OkResponse> {
    info!("shutdown requested over control API");
    state.shutdown.notify_one();
    Json(OkResponse { ok: true })
}
