// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin runner registry: create, list, inspect, soft-delete.
//!
//! The runner token is returned exactly once, on creation. Mutations
//! invalidate the inventory cache so the engine sees them promptly.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use ep_core::{RunnerBackend, RunnerConfig, ServiceError};
use serde::Deserialize;

use super::{validate_ident, ApiError, FieldError};
use crate::auth::verify_admin;
use crate::dto::RunnerResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunnerCreateRequest {
    pub runner_id: String,
    pub backend: String,

    #[serde(default)]
    pub proxmox_host: Option<String>,
    #[serde(default)]
    pub proxmox_user: Option<String>,
    #[serde(default)]
    pub proxmox_token_name: Option<String>,
    #[serde(default)]
    pub proxmox_token_value: Option<String>,
    #[serde(default)]
    pub proxmox_node: Option<String>,
    #[serde(default)]
    pub proxmox_vmid: Option<i64>,

    #[serde(default)]
    pub reset_cmd: Option<String>,
    #[serde(default)]
    pub cleanup_cmd: Option<String>,
    #[serde(default)]
    pub readiness_cmd: Option<String>,

    #[serde(default)]
    pub ci_runner_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunnerCreateRequest {
    fn into_config(self, backend: RunnerBackend) -> RunnerConfig {
        RunnerConfig {
            runner_id: self.runner_id,
            backend,
            token: String::new(),
            proxmox_host: self.proxmox_host,
            proxmox_user: self.proxmox_user,
            proxmox_token_name: self.proxmox_token_name,
            proxmox_token_value: self.proxmox_token_value,
            proxmox_node: self.proxmox_node,
            proxmox_vmid: self.proxmox_vmid,
            reset_cmd: self.reset_cmd,
            cleanup_cmd: self.cleanup_cmd,
            readiness_cmd: self.readiness_cmd,
            ci_runner_id: self.ci_runner_id,
            tags: self.tags,
        }
    }
}

pub async fn create_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RunnerCreateRequest>,
) -> Result<(StatusCode, Json<RunnerResponse>), ApiError> {
    verify_admin(&state.settings, &headers)?;

    let mut errors: Vec<FieldError> = Vec::new();
    errors.extend(validate_ident("runner_id", &body.runner_id, 255));
    let backend = RunnerBackend::parse(&body.backend);
    if backend.is_none() {
        errors.push(FieldError {
            field: "backend".into(),
            message: "must be 'proxmox' or 'bare_metal'".into(),
        });
    }
    let Some(backend) = backend else {
        return Err(ApiError::validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let config = body.into_config(backend);
    if let Err(message) = config.validate() {
        return Err(ApiError::validation(vec![FieldError {
            field: "backend".into(),
            message,
        }]));
    }

    let record = match ep_store::runners::create(&state.pool, &config).await {
        Ok(record) => record,
        Err(ep_store::StoreError::DuplicateRunner { runner_id }) => {
            return Err(
                ServiceError::Conflict(format!("Runner '{runner_id}' already exists")).into(),
            );
        }
        Err(e) => return Err(ServiceError::Internal(e.to_string()).into()),
    };
    state.inventory.invalidate();

    Ok((
        StatusCode::CREATED,
        Json(RunnerResponse::from_record(&record, true)),
    ))
}

pub async fn list_runners(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RunnerResponse>>, ApiError> {
    verify_admin(&state.settings, &headers)?;

    let records = ep_store::runners::list(&state.pool, false)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok(Json(
        records
            .iter()
            .map(|record| RunnerResponse::from_record(record, false))
            .collect(),
    ))
}

pub async fn get_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(runner_id): Path<String>,
) -> Result<Json<RunnerResponse>, ApiError> {
    verify_admin(&state.settings, &headers)?;

    let record = ep_store::runners::get_active(&state.pool, &runner_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .ok_or_else(|| ServiceError::NotFound("Runner not found".into()))?;
    Ok(Json(RunnerResponse::from_record(&record, false)))
}

pub async fn delete_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(runner_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    verify_admin(&state.settings, &headers)?;

    let removed = ep_store::runners::deactivate(&state.pool, &runner_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    if !removed {
        return Err(ServiceError::NotFound("Runner not found".into()).into());
    }
    state.inventory.invalidate();
    Ok(StatusCode::NO_CONTENT)
}
