// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use ep_wire::{MsgType, WsRequest, WsResponse};
use serde_json::json;

use super::*;

async fn echo_server(dir: &tempfile::TempDir) -> IpcServer {
    let path = dir.path().join("agent.sock");
    IpcServer::start(path, |req: WsRequest| async move {
        WsResponse::ok(req.id, json!({"echo": req.payload}))
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn request_response_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = echo_server(&dir).await;
    let path = server.path().to_string_lossy().to_string();

    let response = tokio::task::spawn_blocking(move || {
        let client = IpcClient::new(path, Duration::from_secs(5));
        client.request(&WsRequest {
            id: "req1".into(),
            msg_type: MsgType::Status,
            payload: json!({"checkpoint_name": "job-1-1-aabbccdd"}),
        })
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.id, "req1");
    assert!(response.is_ok());
    assert_eq!(
        response.data.unwrap()["echo"]["checkpoint_name"],
        "job-1-1-aabbccdd"
    );
    server.stop().await;
}

#[tokio::test]
async fn socket_file_has_restricted_mode() {
    let dir = tempfile::tempdir().unwrap();
    let server = echo_server(&dir).await;

    let mode = std::fs::metadata(server.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o660);
    server.stop().await;
}

#[tokio::test]
async fn client_fails_fast_when_agent_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sock").to_string_lossy().to_string();

    let err = tokio::task::spawn_blocking(move || {
        let client = IpcClient::new(path, Duration::from_secs(1));
        client.request(&WsRequest::new(MsgType::Ping, json!({})))
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, AgentError::Io(_)));
}

#[tokio::test]
async fn stop_removes_the_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let server = echo_server(&dir).await;
    let path = server.path().to_path_buf();
    assert!(path.exists());
    server.stop().await;
    assert!(!path.exists());
}

#[tokio::test]
async fn consecutive_connections_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let server = echo_server(&dir).await;
    let path = server.path().to_string_lossy().to_string();

    for i in 0..3 {
        let path = path.clone();
        let response = tokio::task::spawn_blocking(move || {
            let client = IpcClient::new(path, Duration::from_secs(5));
            client.request(&WsRequest {
                id: format!("req{i}"),
                msg_type: MsgType::Ping,
                payload: json!({}),
            })
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(response.id, format!("req{i}"));
    }
    server.stop().await;
}
