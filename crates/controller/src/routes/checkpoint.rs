// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint create / finalize / status endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use ep_core::{is_valid_checkpoint_name, FinalizeStatus, ServiceError};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{validate_ident, ApiError, FieldError};
use crate::auth::verify_token;
use crate::dto::CheckpointResponse;
use crate::service;
use crate::state::AppState;
use crate::tasks;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub runner_id: String,
    pub job_id: String,
    #[serde(default)]
    pub caller: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub checkpoint_name: String,
    pub status: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "hook".to_string()
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<CheckpointResponse>), ApiError> {
    let mut errors: Vec<FieldError> = Vec::new();
    errors.extend(validate_ident("runner_id", &body.runner_id, 255));
    errors.extend(validate_ident("job_id", &body.job_id, 255));
    if let Some(caller) = &body.caller {
        if caller.len() > 255 {
            errors.push(FieldError {
                field: "caller".into(),
                message: "must be at most 255 characters".into(),
            });
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let token_runner_id = verify_token(&state.pool, &headers).await?;

    let inventory = state
        .inventory
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    let runner = inventory
        .get_runner(&body.runner_id)
        .ok_or_else(|| ServiceError::NotFound("Runner not found in inventory".into()))?;

    if runner.runner_id != token_runner_id {
        return Err(ServiceError::Forbidden("Token not authorized for this runner".into()).into());
    }

    let backend = state
        .backends
        .for_runner(runner)
        .ok_or_else(|| ServiceError::Internal(format!("unknown backend: {}", runner.backend)))?;

    let checkpoint = service::create_checkpoint(
        &state.pool,
        runner,
        backend.as_ref(),
        &body.job_id,
        body.caller.as_deref(),
        &state.settings,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CheckpointResponse::from(&checkpoint))))
}

pub async fn finalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FinalizeRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut errors: Vec<FieldError> = Vec::new();
    if !is_valid_checkpoint_name(&body.checkpoint_name) {
        errors.push(FieldError {
            field: "checkpoint_name".into(),
            message: "must match the checkpoint name pattern".into(),
        });
    }
    let status = FinalizeStatus::parse(&body.status);
    if status.is_none() {
        errors.push(FieldError {
            field: "status".into(),
            message: "must be one of success, failure, canceled".into(),
        });
    }
    errors.extend(validate_ident("source", &body.source, 100));
    let Some(status) = status else {
        return Err(ApiError::validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let token_runner_id = verify_token(&state.pool, &headers).await?;

    let checkpoint = service::get_by_name(&state.pool, &body.checkpoint_name)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Checkpoint not found".into()))?;
    if checkpoint.runner_id != token_runner_id {
        return Err(
            ServiceError::Forbidden("Token not authorized for this checkpoint".into()).into(),
        );
    }

    let (checkpoint, already) =
        service::queue_finalize(&state.pool, &body.checkpoint_name, status, &body.source).await?;

    if already {
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({"detail": "Already finalized", "state": checkpoint.state.as_str()})),
        ));
    }

    if !tasks::enqueue_or_log(&state.pool, &checkpoint.name).await {
        return Err(ServiceError::Unavailable(
            "Finalize queued in DB but task broker unavailable. \
             The task will be retried on next reconciliation."
                .into(),
        )
        .into());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"detail": "Finalize queued", "checkpoint_name": checkpoint.name})),
    ))
}

pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(checkpoint_name): Path<String>,
) -> Result<Json<CheckpointResponse>, ApiError> {
    let token_runner_id = verify_token(&state.pool, &headers).await?;

    let checkpoint = service::get_by_name(&state.pool, &checkpoint_name)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Checkpoint not found".into()))?;
    if checkpoint.runner_id != token_runner_id {
        return Err(
            ServiceError::Forbidden("Token not authorized for this checkpoint".into()).into(),
        );
    }

    Ok(Json(CheckpointResponse::from(&checkpoint)))
}
