// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner readiness probe, backed by the backend's `check_ready`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use ep_core::ServiceError;
use serde_json::{json, Value};

use super::ApiError;
use crate::auth::verify_token;
use crate::state::AppState;

pub async fn readiness(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let runner_id = verify_token(&state.pool, &headers).await?;

    let inventory = state
        .inventory
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    let runner = inventory
        .get_runner(&runner_id)
        .ok_or_else(|| ServiceError::NotFound("Runner not found".into()))?;

    let backend = state
        .backends
        .for_runner(runner)
        .ok_or_else(|| ServiceError::Internal(format!("unknown backend: {}", runner.backend)))?;

    match backend.check_ready(runner).await {
        Ok(true) => Ok((
            StatusCode::OK,
            Json(json!({"runner_id": runner_id, "ready": true})),
        )),
        Ok(false) => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"runner_id": runner_id, "ready": false})),
        )),
        Err(e) => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"runner_id": runner_id, "ready": false, "detail": e.to_string()})),
        )),
    }
}
