// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO structs for the agent channel and the CLI IPC socket.
//!
//! Both transports carry the same shapes: requests are
//! `{id, type, payload}`, responses are `{id, status, data | error}`.
//! Either side correlates a response to its request by `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kinds. `exec` flows controller→agent; the rest originate at
/// the agent (heartbeats and CLI requests proxied over the channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    Ping,
    Create,
    Finalize,
    Status,
    Exec,
}

/// A request frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    #[serde(default)]
    pub payload: Value,
}

impl WsRequest {
    pub fn new(msg_type: MsgType, payload: Value) -> Self {
        Self {
            id: new_message_id(),
            msg_type,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespStatus {
    Ok,
    Error,
}

/// Error object carried by failed responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsError {
    pub code: u16,
    pub detail: String,
}

/// A response frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsResponse {
    pub id: String,
    pub status: RespStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WsError>,
}

impl WsResponse {
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            status: RespStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: u16, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: RespStatus::Error,
            data: None,
            error: Some(WsError {
                code,
                detail: detail.into(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RespStatus::Ok
    }
}

/// An inbound frame is either a response to something we sent or a new
/// request. Responses carry `status`, requests carry `type`; serde tries
/// the response shape first.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Frame {
    Response(WsResponse),
    Request(WsRequest),
}

// --- typed payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecPayload {
    pub cmd: String,
    /// Seconds before the agent kills the subprocess.
    #[serde(default = "default_exec_timeout")]
    pub timeout: f64,
}

fn default_exec_timeout() -> f64 {
    120.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePayload {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalizePayload {
    pub checkpoint_name: String,
    pub status: String,
    #[serde(default = "default_finalize_source")]
    pub source: String,
}

fn default_finalize_source() -> String {
    "agent".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPayload {
    pub checkpoint_name: String,
}

/// 12-hex-char correlation id for request/response pairing.
pub fn new_message_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
