// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ep_wire::WsResponse;

use super::*;
use crate::exit_error::{EXIT_AGENT_UNREACHABLE, EXIT_OPERATION};

#[test]
fn explicit_socket_wins_over_config() {
    let socket = resolve_socket(Some("/tmp/custom.sock")).unwrap();
    assert_eq!(socket, "/tmp/custom.sock");
}

#[test]
fn response_error_extracts_the_detail() {
    let response = WsResponse::err("x", 409, "Active checkpoint exists");
    let err = response_error(&response);
    assert_eq!(err.code, EXIT_OPERATION);
    assert_eq!(err.message, "Active checkpoint exists");
}

#[test]
fn response_error_without_body_is_unknown() {
    let response = WsResponse {
        id: "x".into(),
        status: ep_wire::RespStatus::Error,
        data: None,
        error: None,
    };
    assert_eq!(response_error(&response).message, "Unknown error");
}

#[tokio::test]
async fn missing_socket_maps_to_exit_code_2() {
    let request = ep_wire::WsRequest::new(ep_wire::MsgType::Ping, serde_json::json!({}));
    let err = ipc_request(Some("/nonexistent/agent.sock"), request)
        .await
        .unwrap_err();
    assert_eq!(err.code, EXIT_AGENT_UNREACHABLE);
    assert_eq!(err.message, "agent is not running");
}
