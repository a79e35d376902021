// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box specs for the `e2epool` binary.
//!
//! These exercise the CLI surface and the agent IPC contract without a
//! controller or database: checkpoint commands run against a fake agent
//! socket speaking the length-prefixed JSON protocol.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;
use ep_wire::{read_message, write_message, WsRequest, WsResponse};
use serde_json::json;
use tokio::net::UnixListener;

fn cli() -> Command {
    Command::cargo_bin("e2epool").unwrap()
}

/// One-shot fake agent: answers a single IPC request with `response`
/// (keyed to the incoming request id) and returns the request it saw.
async fn fake_agent(
    listener: UnixListener,
    build_response: impl FnOnce(&WsRequest) -> WsResponse + Send + 'static,
) -> WsRequest {
    let (mut stream, _) = listener.accept().await.unwrap();
    let request: WsRequest = read_message(&mut stream).await.unwrap();
    let response = build_response(&request);
    write_message(&mut stream, &response).await.unwrap();
    request
}

#[test]
fn help_shows_usage_and_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Usage:"))
        .stdout(predicates::str::contains("agent"))
        .stdout(predicates::str::contains("import-inventory"));
}

#[test]
fn version_prints_the_crate_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("0.1"));
}

#[test]
fn finalize_rejects_an_unknown_status() {
    cli()
        .args(["finalize", "--checkpoint", "job-1-1-aabbccdd", "--status", "exploded"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value"));
}

#[test]
fn create_without_an_agent_exits_2() {
    cli()
        .args(["create", "--job-id", "42", "--socket", "/nonexistent/agent.sock"])
        .assert()
        .code(2)
        .stderr(predicates::str::contains("agent is not running"));
}

#[test]
fn import_inventory_dry_run_lists_runners() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.yml");
    std::fs::write(
        &path,
        r#"
runners:
  - runner_id: bare-01
    backend: bare_metal
    token: tok-b
    reset_cmd: "reset.sh"
"#,
    )
    .unwrap();

    cli()
        .args(["import-inventory", "--path", path.to_str().unwrap(), "--dry-run"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Would import 1 runner(s):"))
        .stdout(predicates::str::contains("bare-01"));
}

#[test]
fn import_inventory_rejects_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.yml");
    std::fs::write(
        &path,
        "runners:\n  - runner_id: bare-01\n    backend: bare_metal\n    token: t\n",
    )
    .unwrap();

    cli()
        .args(["import-inventory", "--path", path.to_str().unwrap(), "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicates::str::contains("reset_cmd"));
}

#[tokio::test]
async fn status_command_round_trips_through_the_ipc_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let server = tokio::spawn(fake_agent(listener, |request| {
        WsResponse::ok(
            &request.id,
            json!({
                "name": "job-42-1700000000-aabbccdd",
                "state": "reset",
                "finalize_status": "success",
            }),
        )
    }));

    let socket = socket_path.to_str().unwrap().to_string();
    let assert = tokio::task::spawn_blocking(move || {
        cli()
            .args(["status", "--checkpoint", "job-42-1700000000-aabbccdd", "--socket", &socket])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicates::str::contains("name:   job-42-1700000000-aabbccdd"))
        .stdout(predicates::str::contains("state:  reset"))
        .stdout(predicates::str::contains("result: success"));

    let request = server.await.unwrap();
    assert_eq!(request.payload["checkpoint_name"], "job-42-1700000000-aabbccdd");
}

#[tokio::test]
async fn create_command_prints_the_checkpoint_name() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let server = tokio::spawn(fake_agent(listener, |request| {
        WsResponse::ok(&request.id, json!({"name": "job-7-1-deadbeef", "state": "created"}))
    }));

    let socket = socket_path.to_str().unwrap().to_string();
    let assert = tokio::task::spawn_blocking(move || {
        cli()
            .args(["create", "--job-id", "7", "--socket", &socket])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicates::str::contains("job-7-1-deadbeef"));

    let request = server.await.unwrap();
    assert_eq!(request.payload["job_id"], "7");
}

#[tokio::test]
async fn error_responses_exit_1_with_the_detail() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    tokio::spawn(fake_agent(listener, |request| {
        WsResponse::err(&request.id, 404, "Checkpoint not found")
    }));

    let socket = socket_path.to_str().unwrap().to_string();
    let assert = tokio::task::spawn_blocking(move || {
        cli()
            .args(["status", "--checkpoint", "job-9-1-aabbccdd", "--socket", &socket])
            .assert()
    })
    .await
    .unwrap();

    assert
        .code(1)
        .stderr(predicates::str::contains("Checkpoint not found"));
}
