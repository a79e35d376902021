// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ep_core::{RunnerBackend, RunnerConfig};

use super::*;
use crate::test_support::FakeAgentRpc;

fn runner() -> RunnerConfig {
    let mut r = RunnerConfig::new("bare-01", RunnerBackend::BareMetal);
    r.reset_cmd = Some("reset.sh".into());
    r
}

#[tokio::test]
async fn create_checkpoint_is_a_no_op() {
    let rpc = FakeAgentRpc::connected();
    let backend = BareMetalBackend::new(rpc.clone());
    backend
        .create_checkpoint(&runner(), "job-1-1-aabbccdd")
        .await
        .unwrap();
    assert!(rpc.commands().is_empty());
}

#[tokio::test]
async fn reset_runs_the_reset_cmd() {
    let rpc = FakeAgentRpc::connected();
    let backend = BareMetalBackend::new(rpc.clone());
    backend.reset(&runner(), "job-1-1-aabbccdd").await.unwrap();
    assert_eq!(rpc.commands(), vec!["reset.sh".to_string()]);
}

#[tokio::test]
async fn reset_without_cmd_does_nothing() {
    let rpc = FakeAgentRpc::connected();
    let backend = BareMetalBackend::new(rpc.clone());
    let mut r = runner();
    r.reset_cmd = None;
    backend.reset(&r, "job-1-1-aabbccdd").await.unwrap();
    assert!(rpc.commands().is_empty());
}

#[tokio::test]
async fn reset_propagates_agent_failure() {
    let rpc = FakeAgentRpc::connected();
    *rpc.exec_fails.lock() = true;
    let backend = BareMetalBackend::new(rpc.clone());
    let err = backend.reset(&runner(), "job-1-1-aabbccdd").await.unwrap_err();
    assert!(matches!(err, BackendError::Agent(_)));
}

#[tokio::test]
async fn cleanup_runs_cleanup_cmd_when_present() {
    let rpc = FakeAgentRpc::connected();
    let backend = BareMetalBackend::new(rpc.clone());
    let mut r = runner();
    r.cleanup_cmd = Some("cleanup.sh".into());
    backend.cleanup(&r, "job-1-1-aabbccdd").await.unwrap();
    assert_eq!(rpc.commands(), vec!["cleanup.sh".to_string()]);
}

#[tokio::test]
async fn readiness_cmd_success_means_ready() {
    let rpc = FakeAgentRpc::connected();
    let backend = BareMetalBackend::new(rpc.clone());
    let mut r = runner();
    r.readiness_cmd = Some("check.sh".into());
    assert!(backend.check_ready(&r).await.unwrap());
    assert_eq!(rpc.commands(), vec!["check.sh".to_string()]);
}

#[tokio::test]
async fn readiness_cmd_failure_means_not_ready() {
    let rpc = FakeAgentRpc::connected();
    *rpc.exec_fails.lock() = true;
    let backend = BareMetalBackend::new(rpc.clone());
    let mut r = runner();
    r.readiness_cmd = Some("check.sh".into());
    assert!(!backend.check_ready(&r).await.unwrap());
}

#[tokio::test]
async fn readiness_without_cmd_probes_connectivity() {
    let backend = BareMetalBackend::new(FakeAgentRpc::connected());
    assert!(backend.check_ready(&runner()).await.unwrap());

    let backend = BareMetalBackend::new(FakeAgentRpc::disconnected());
    assert!(!backend.check_ready(&runner()).await.unwrap());
}
