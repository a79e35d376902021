// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service dispatch for agent-originated channel requests.
//!
//! Agents proxy their CLI's `create`/`finalize`/`status` over the
//! channel; the controller answers from the checkpoint service with the
//! same semantics as the HTTP surface, including ownership checks.

use ep_core::{FinalizeStatus, RunnerConfig, ServiceError};
use ep_wire::{CreatePayload, FinalizePayload, MsgType, StatusPayload, WsRequest, WsResponse};
use serde_json::json;

use crate::dto::CheckpointResponse;
use crate::service;
use crate::state::AppState;
use crate::tasks;

pub async fn handle_message(
    state: &AppState,
    runner: &RunnerConfig,
    request: WsRequest,
) -> WsResponse {
    let id = request.id.clone();
    let result = match request.msg_type {
        MsgType::Ping => return WsResponse::ok(id, json!({"pong": true})),
        MsgType::Create => handle_create(state, runner, request).await,
        MsgType::Finalize => handle_finalize(state, runner, request).await,
        MsgType::Status => handle_status(state, runner, request).await,
        MsgType::Exec => Err(ServiceError::Validation(
            "exec flows controller to agent, not the reverse".into(),
        )),
    };

    match result {
        Ok(response) => response,
        Err(e) => WsResponse::err(id, e.status_code(), e.detail()),
    }
}

async fn handle_create(
    state: &AppState,
    runner: &RunnerConfig,
    request: WsRequest,
) -> Result<WsResponse, ServiceError> {
    let payload: CreatePayload = serde_json::from_value(request.payload)
        .map_err(|_| ServiceError::Validation("job_id is required".into()))?;
    if payload.job_id.is_empty() {
        return Err(ServiceError::Validation("job_id is required".into()));
    }

    let backend = state
        .backends
        .for_runner(runner)
        .ok_or_else(|| ServiceError::Internal(format!("unknown backend: {}", runner.backend)))?;

    let checkpoint = service::create_checkpoint(
        &state.pool,
        runner,
        backend.as_ref(),
        &payload.job_id,
        payload.caller.as_deref(),
        &state.settings,
    )
    .await?;

    let data = serde_json::to_value(CheckpointResponse::from(&checkpoint))
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok(WsResponse::ok(request.id, data))
}

async fn handle_finalize(
    state: &AppState,
    runner: &RunnerConfig,
    request: WsRequest,
) -> Result<WsResponse, ServiceError> {
    let payload: FinalizePayload = serde_json::from_value(request.payload).map_err(|_| {
        ServiceError::Validation("checkpoint_name and status are required".into())
    })?;
    if payload.checkpoint_name.is_empty() || payload.status.is_empty() {
        return Err(ServiceError::Validation(
            "checkpoint_name and status are required".into(),
        ));
    }
    let status = FinalizeStatus::parse(&payload.status).ok_or_else(|| {
        ServiceError::Validation(format!("invalid finalize status '{}'", payload.status))
    })?;

    let checkpoint = service::get_by_name(&state.pool, &payload.checkpoint_name)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Checkpoint not found".into()))?;
    if checkpoint.runner_id != runner.runner_id {
        return Err(ServiceError::Forbidden(
            "Not authorized for this checkpoint".into(),
        ));
    }

    let (checkpoint, already) =
        service::queue_finalize(&state.pool, &payload.checkpoint_name, status, &payload.source)
            .await?;
    if already {
        return Ok(WsResponse::ok(
            request.id,
            json!({"detail": "Already finalized", "state": checkpoint.state.as_str()}),
        ));
    }

    if !tasks::enqueue_or_log(&state.pool, &checkpoint.name).await {
        return Err(ServiceError::Unavailable(
            "Finalize queued in DB but task broker unavailable. \
             The task will be retried on next reconciliation."
                .into(),
        ));
    }

    Ok(WsResponse::ok(
        request.id,
        json!({"detail": "Finalize queued", "checkpoint_name": checkpoint.name}),
    ))
}

async fn handle_status(
    state: &AppState,
    runner: &RunnerConfig,
    request: WsRequest,
) -> Result<WsResponse, ServiceError> {
    let payload: StatusPayload = serde_json::from_value(request.payload)
        .map_err(|_| ServiceError::Validation("checkpoint_name is required".into()))?;
    if payload.checkpoint_name.is_empty() {
        return Err(ServiceError::Validation("checkpoint_name is required".into()));
    }

    let checkpoint = service::get_by_name(&state.pool, &payload.checkpoint_name)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Checkpoint not found".into()))?;
    if checkpoint.runner_id != runner.runner_id {
        return Err(ServiceError::Forbidden(
            "Not authorized for this checkpoint".into(),
        ));
    }

    let data = serde_json::to_value(CheckpointResponse::from(&checkpoint))
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok(WsResponse::ok(request.id, data))
}
