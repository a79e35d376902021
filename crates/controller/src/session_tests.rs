// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use tokio::sync::mpsc;

use super::*;

fn connected(manager: &SessionManager, runner_id: &str) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.connect(runner_id, tx);
    rx
}

#[tokio::test]
async fn send_command_to_unknown_runner_fails_fast() {
    let manager = SessionManager::new();
    let err = manager
        .send_command("ghost", json!({"cmd": "true"}), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotConnected(_)));
}

#[tokio::test]
async fn response_routing_resolves_the_command() {
    let manager = std::sync::Arc::new(SessionManager::new());
    let mut rx = connected(&manager, "r1");

    let send = {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .send_command("r1", json!({"cmd": "echo hi", "timeout": 5.0}), Duration::from_secs(5))
                .await
        })
    };

    // Read the outbound frame, echo a response with the same id.
    let frame = rx.recv().await.unwrap();
    let request: ep_wire::WsRequest = serde_json::from_str(&frame).unwrap();
    assert_eq!(request.msg_type, MsgType::Exec);
    assert_eq!(request.id.len(), 12);

    let routed = manager.route_response(WsResponse::ok(
        &request.id,
        json!({"exit_code": 0, "stdout": "hi\n", "stderr": ""}),
    ));
    assert!(routed);

    let response = send.await.unwrap().unwrap();
    assert_eq!(response.data.unwrap()["stdout"], "hi\n");
}

#[tokio::test]
async fn unmatched_response_is_reported() {
    let manager = SessionManager::new();
    assert!(!manager.route_response(WsResponse::ok("nobody", json!({}))));
}

#[tokio::test]
async fn timeout_removes_the_pending_entry() {
    let manager = SessionManager::new();
    let _rx = connected(&manager, "r1");

    let err = manager
        .send_command("r1", json!({"cmd": "sleep 60"}), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { .. }));
    assert!(manager.pending.lock().is_empty());
}

#[tokio::test]
async fn disconnect_fails_pending_commands() {
    let manager = std::sync::Arc::new(SessionManager::new());
    let mut rx = connected(&manager, "r1");

    let send = {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .send_command("r1", json!({"cmd": "true"}), Duration::from_secs(5))
                .await
        })
    };
    rx.recv().await.unwrap();

    manager.disconnect("r1");
    let err = send.await.unwrap().unwrap_err();
    assert!(matches!(err, ChannelError::Disconnected(_)));
    assert!(!manager.is_connected("r1"));
}

#[tokio::test]
async fn disconnect_only_fails_that_runners_requests() {
    let manager = std::sync::Arc::new(SessionManager::new());
    let mut rx1 = connected(&manager, "r1");
    let _rx2 = connected(&manager, "r2");

    let send = {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .send_command("r1", json!({"cmd": "true"}), Duration::from_secs(5))
                .await
        })
    };
    let frame = rx1.recv().await.unwrap();
    let request: ep_wire::WsRequest = serde_json::from_str(&frame).unwrap();

    manager.disconnect("r2");
    // r1's pending entry survived r2's disconnect.
    assert!(manager.route_response(WsResponse::ok(&request.id, json!({"exit_code": 0}))));
    assert!(send.await.unwrap().is_ok());
}

#[tokio::test]
async fn reconnect_replaces_the_session() {
    let manager = SessionManager::new();
    let _old = connected(&manager, "r1");
    let mut new = connected(&manager, "r1");
    assert_eq!(manager.connected_runners(), vec!["r1".to_string()]);

    let _ = manager
        .send_command("r1", json!({"cmd": "true"}), Duration::from_millis(20))
        .await;
    // The frame went to the most recent session.
    assert!(new.try_recv().is_ok());
}

#[tokio::test]
async fn wait_for_agent_polls_until_connected() {
    let manager = std::sync::Arc::new(SessionManager::new());

    let waiter = {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .wait_for_agent("r1", Duration::from_secs(5), Duration::from_millis(5))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let _rx = connected(&manager, "r1");

    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn wait_for_agent_times_out() {
    let manager = SessionManager::new();
    assert!(
        !manager
            .wait_for_agent("ghost", Duration::from_millis(30), Duration::from_millis(5))
            .await
    );
}
