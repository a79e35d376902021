// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use httpmock::prelude::*;
use serde_json::json;
use yare::parameterized;

use super::*;

#[parameterized(
    success = { "success", JobStatus::Success },
    failed = { "failed", JobStatus::Failure },
    canceled = { "canceled", JobStatus::Canceled },
    running = { "running", JobStatus::Running },
    manual = { "manual", JobStatus::Running },
    pending = { "pending", JobStatus::Running },
    created = { "created", JobStatus::Running },
    unknown = { "some-new-status", JobStatus::Running },
)]
fn provider_vocabulary_normalizes(gitlab_status: &str, expected: JobStatus) {
    assert_eq!(normalize_status(gitlab_status), expected);
}

#[tokio::test]
async fn job_status_uses_project_scoped_url_when_configured() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v4/projects/7/jobs/123")
            .header("PRIVATE-TOKEN", "tok");
        then.status(200).json_body(json!({"status": "failed"}));
    });

    let adapter = GitLabAdapter::new(server.base_url(), "tok", Some(7));
    let status = adapter.job_status("123").await.unwrap();
    assert_eq!(status, JobStatus::Failure);
    mock.assert();
}

#[tokio::test]
async fn job_status_falls_back_to_global_jobs_url() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v4/jobs/9");
        then.status(200).json_body(json!({"status": "success"}));
    });

    let adapter = GitLabAdapter::new(server.base_url(), "tok", None);
    assert_eq!(adapter.job_status("9").await.unwrap(), JobStatus::Success);
    mock.assert();
}

#[tokio::test]
async fn missing_job_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v4/jobs/404");
        then.status(404).json_body(json!({"message": "404 Not Found"}));
    });

    let adapter = GitLabAdapter::new(server.base_url(), "tok", None);
    let err = adapter.job_status("404").await.unwrap_err();
    assert!(matches!(err, CiError::NotFound(_)));
}

#[tokio::test]
async fn pause_and_unpause_toggle_the_active_flag() {
    let server = MockServer::start();
    let pause = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v4/runners/5")
            .json_body(json!({"active": false}));
        then.status(200).json_body(json!({"id": 5}));
    });
    let adapter = GitLabAdapter::new(server.base_url(), "tok", None);
    adapter.pause_runner(5).await.unwrap();
    pause.assert();

    let unpause = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v4/runners/5")
            .json_body(json!({"active": true}));
        then.status(200).json_body(json!({"id": 5}));
    });
    adapter.unpause_runner(5).await.unwrap();
    unpause.assert();
}

#[tokio::test]
async fn pause_of_unknown_runner_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/api/v4/runners/99");
        then.status(404);
    });

    let adapter = GitLabAdapter::new(server.base_url(), "tok", None);
    let err = adapter.pause_runner(99).await.unwrap_err();
    assert!(matches!(err, CiError::NotFound(_)));
}

#[tokio::test]
async fn server_errors_surface_as_api_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v4/jobs/1");
        then.status(500);
    });

    let adapter = GitLabAdapter::new(server.base_url(), "tok", None);
    let err = adapter.job_status("1").await.unwrap_err();
    assert!(matches!(err, CiError::Api(_)));
}
