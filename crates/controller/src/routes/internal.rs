// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal agent endpoints consumed by worker processes.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::session::ChannelError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub cmd: String,
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn default_timeout() -> f64 {
    120.0
}

/// Execute a command on a connected agent.
pub async fn agent_exec(
    State(state): State<AppState>,
    Path(runner_id): Path<String>,
    Json(body): Json<ExecRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.sessions.is_connected(&runner_id) {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Agent {runner_id} not connected"),
        ));
    }

    let timeout = Duration::from_secs_f64(body.timeout.max(0.0));
    let result = state
        .sessions
        .send_command(
            &runner_id,
            json!({ "cmd": body.cmd, "timeout": body.timeout }),
            timeout + Duration::from_secs(5),
        )
        .await;

    let response = match result {
        Ok(response) => response,
        Err(ChannelError::Timeout { .. }) => {
            return Err(ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                format!("Agent {runner_id} timed out"),
            ));
        }
        Err(e) => {
            return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()));
        }
    };

    let data = response.data.clone().unwrap_or_default();
    let exit_code = data.get("exit_code").and_then(|v| v.as_i64()).unwrap_or(-1);
    let stdout = data.get("stdout").and_then(|v| v.as_str()).unwrap_or("");
    let stderr = data.get("stderr").and_then(|v| v.as_str()).unwrap_or("");

    if !response.is_ok() {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            format!("Command failed (exit {exit_code}): {stderr}"),
        ));
    }

    Ok(Json(json!({
        "exit_code": exit_code,
        "stdout": stdout,
        "stderr": stderr,
    })))
}

/// Check whether an agent holds a live channel.
pub async fn agent_connected(
    State(state): State<AppState>,
    Path(runner_id): Path<String>,
) -> Json<Value> {
    Json(json!({ "connected": state.sessions.is_connected(&runner_id) }))
}
