// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint commands: proxied to the controller through the local
//! agent's IPC socket.

use std::time::Duration;

use ep_agent::{load_agent_config, IpcClient};
use ep_wire::{MsgType, WsRequest, WsResponse};
use serde_json::json;

use crate::exit_error::ExitError;

fn resolve_socket(socket: Option<&str>) -> Result<String, ExitError> {
    if let Some(socket) = socket {
        return Ok(socket.to_string());
    }
    let config = load_agent_config(None).map_err(|e| ExitError::operation(e.to_string()))?;
    Ok(config.socket_path)
}

async fn ipc_request(socket: Option<&str>, request: WsRequest) -> Result<WsResponse, ExitError> {
    let socket_path = resolve_socket(socket)?;
    let response = tokio::task::spawn_blocking(move || {
        let client = IpcClient::new(socket_path, Duration::from_secs(30));
        client.request(&request)
    })
    .await
    .map_err(|e| ExitError::operation(e.to_string()))?;

    response.map_err(|e| match &e {
        ep_agent::AgentError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
            ) =>
        {
            ExitError::agent_unreachable("agent is not running")
        }
        _ => ExitError::operation(e.to_string()),
    })
}

fn response_error(response: &WsResponse) -> ExitError {
    let detail = response
        .error
        .as_ref()
        .map(|e| e.detail.clone())
        .unwrap_or_else(|| "Unknown error".to_string());
    ExitError::operation(detail)
}

pub async fn create(job_id: &str, socket: Option<&str>) -> Result<(), ExitError> {
    let request = WsRequest::new(MsgType::Create, json!({ "job_id": job_id }));
    let response = ipc_request(socket, request).await?;

    match (&response.data, response.is_ok()) {
        (Some(data), true) => {
            println!("{}", data.get("name").and_then(|v| v.as_str()).unwrap_or(""));
            Ok(())
        }
        _ => Err(response_error(&response)),
    }
}

pub async fn finalize(
    checkpoint: &str,
    status: &str,
    socket: Option<&str>,
) -> Result<(), ExitError> {
    let request = WsRequest::new(
        MsgType::Finalize,
        json!({
            "checkpoint_name": checkpoint,
            "status": status,
            "source": "agent",
        }),
    );
    let response = ipc_request(socket, request).await?;

    if response.is_ok() {
        let detail = response
            .data
            .as_ref()
            .and_then(|d| d.get("detail"))
            .and_then(|v| v.as_str())
            .unwrap_or("OK");
        println!("{detail}");
        Ok(())
    } else {
        Err(response_error(&response))
    }
}

pub async fn status(checkpoint: &str, socket: Option<&str>) -> Result<(), ExitError> {
    let request = WsRequest::new(
        MsgType::Status,
        json!({ "checkpoint_name": checkpoint }),
    );
    let response = ipc_request(socket, request).await?;

    match (&response.data, response.is_ok()) {
        (Some(data), true) => {
            println!("name:   {}", data.get("name").and_then(|v| v.as_str()).unwrap_or(""));
            println!("state:  {}", data.get("state").and_then(|v| v.as_str()).unwrap_or(""));
            if let Some(result) = data.get("finalize_status").and_then(|v| v.as_str()) {
                println!("result: {result}");
            }
            Ok(())
        }
        _ => Err(response_error(&response)),
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
