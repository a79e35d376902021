// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook ingestion: terminal job statuses pushed by the CI platform.
//!
//! Both endpoints always answer 200 on well-formed payloads — a non-200
//! would make the provider retry and manufacture duplicate work. Only
//! authentication failures are surfaced.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use ep_core::{CheckpointState, FinalizeStatus};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use super::ApiError;
use crate::auth::constant_time_eq;
use crate::service;
use crate::state::AppState;
use crate::tasks;

type HmacSha256 = Hmac<Sha256>;

/// GitLab `build_status` → finalize status; `None` means not terminal.
pub(crate) fn map_gitlab_status(build_status: &str) -> Option<FinalizeStatus> {
    match build_status {
        "success" => Some(FinalizeStatus::Success),
        "failed" => Some(FinalizeStatus::Failure),
        "canceled" => Some(FinalizeStatus::Canceled),
        _ => None,
    }
}

/// GitHub `conclusion` → finalize status; `None` means not terminal.
pub(crate) fn map_github_conclusion(conclusion: &str) -> Option<FinalizeStatus> {
    match conclusion {
        "success" => Some(FinalizeStatus::Success),
        "failure" => Some(FinalizeStatus::Failure),
        "cancelled" => Some(FinalizeStatus::Canceled),
        "timed_out" => Some(FinalizeStatus::Failure),
        _ => None,
    }
}

pub(crate) fn verify_gitlab_token(secret: Option<&str>, header: Option<&str>) -> bool {
    constant_time_eq(
        header.unwrap_or("").as_bytes(),
        secret.unwrap_or("").as_bytes(),
    )
}

pub(crate) fn github_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length; unreachable in practice.
        Err(_) => return String::new(),
    };
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256={hex}")
}

pub(crate) fn verify_github_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let expected = github_signature(secret, body);
    constant_time_eq(header.as_bytes(), expected.as_bytes())
}

/// Job id fields arrive as numbers from GitLab/GitHub; normalize to the
/// string form checkpoints are keyed by.
fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn ok() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"ok": true})))
}

pub async fn gitlab(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let token = headers.get("X-Gitlab-Token").and_then(|v| v.to_str().ok());
    if !verify_gitlab_token(state.settings.gitlab_webhook_secret.as_deref(), token) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Invalid webhook token"));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")))?;

    if payload.get("object_kind").and_then(|v| v.as_str()) != Some("build") {
        return Ok(ok());
    }
    let Some(job_id) = payload.get("build_id").and_then(value_to_id) else {
        return Ok(ok());
    };
    let Some(status) = payload
        .get("build_status")
        .and_then(|v| v.as_str())
        .and_then(map_gitlab_status)
    else {
        // Non-terminal status (running, pending, created, ...).
        return Ok(ok());
    };

    dispatch(&state, &job_id, status, "gitlab").await;
    Ok(ok())
}

pub async fn github(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(secret) = state.settings.github_webhook_secret.as_deref() else {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "GitHub webhook secret not configured",
        ));
    };
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_github_signature(secret, &body, signature) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "Invalid webhook signature",
        ));
    }

    if headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        != Some("workflow_job")
    {
        return Ok(ok());
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")))?;

    if payload.get("action").and_then(|v| v.as_str()) != Some("completed") {
        return Ok(ok());
    }
    let workflow_job = payload.get("workflow_job").cloned().unwrap_or_default();
    let Some(job_id) = workflow_job.get("id").and_then(value_to_id) else {
        return Ok(ok());
    };
    let Some(status) = workflow_job
        .get("conclusion")
        .and_then(|v| v.as_str())
        .and_then(map_github_conclusion)
    else {
        return Ok(ok());
    };

    dispatch(&state, &job_id, status, "github").await;
    Ok(ok())
}

/// Shared queue path. Internal failures are logged, never surfaced;
/// replays of an already-queued row cause no additional enqueues.
async fn dispatch(state: &AppState, job_id: &str, status: FinalizeStatus, provider: &str) {
    let checkpoint = match ep_store::checkpoints::find_by_job_id(&state.pool, job_id).await {
        Ok(Some(checkpoint)) => checkpoint,
        Ok(None) => {
            tracing::debug!(job_id, "Webhook: no checkpoint for job_id");
            return;
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Webhook: checkpoint lookup failed");
            return;
        }
    };

    if checkpoint.state != CheckpointState::Created {
        tracing::debug!(
            checkpoint = %checkpoint.name,
            state = %checkpoint.state,
            "Webhook: checkpoint not in created state"
        );
        return;
    }

    match service::queue_finalize(&state.pool, &checkpoint.name, status, "webhook").await {
        Ok((_, true)) => {}
        Ok((_, false)) => {
            if tasks::enqueue_or_log(&state.pool, &checkpoint.name).await {
                tracing::info!(
                    checkpoint = %checkpoint.name,
                    status = %status,
                    source = provider,
                    "Webhook queued finalize"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                checkpoint = %checkpoint.name,
                error = %e,
                "Webhook failed to queue finalize"
            );
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
