// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests against a live PostgreSQL.
//!
//! Run with `E2EPOOL_TEST_DATABASE_URL` pointing at a scratch database:
//! `cargo test -p ep-store -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Utc;
use ep_core::{CheckpointState, FinalizeStatus};
use ep_store::{checkpoints, oplog, queue, runners, RunnerLock, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

async fn test_pool() -> PgPool {
    let url = std::env::var("E2EPOOL_TEST_DATABASE_URL")
        .expect("E2EPOOL_TEST_DATABASE_URL must point at a scratch database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    ep_store::migrate(&pool).await.expect("migrate");
    pool
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid_ish())
}

fn uuid_ish() -> String {
    let n: u64 = rand::random();
    format!("{n:016x}")
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn second_active_checkpoint_violates_partial_index() {
    let pool = test_pool().await;
    let runner = unique("r");
    let now = Utc::now();

    checkpoints::insert(&pool, &unique("job-a-1-aabbccdd"), &runner, "a", now)
        .await
        .unwrap();
    let err = checkpoints::insert(&pool, &unique("job-b-1-aabbccdd"), &runner, "b", now)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateActive { .. }));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn terminal_checkpoint_frees_the_runner() {
    let pool = test_pool().await;
    let runner = unique("r");
    let now = Utc::now();

    let first = checkpoints::insert(&pool, &unique("job-a-1-aabbccdd"), &runner, "a", now)
        .await
        .unwrap();
    let queued =
        checkpoints::mark_finalize_queued(&pool, first.id, FinalizeStatus::Success, "hook", now)
            .await
            .unwrap();
    assert_eq!(queued.state, CheckpointState::FinalizeQueued);
    checkpoints::set_state(&pool, first.id, CheckpointState::Reset)
        .await
        .unwrap();

    // A new active row is legal again.
    checkpoints::insert(&pool, &unique("job-b-1-aabbccdd"), &runner, "b", now)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn operation_logs_cascade_and_list_in_order() {
    let pool = test_pool().await;
    let runner = unique("r");
    let now = Utc::now();
    let cp = checkpoints::insert(&pool, &unique("job-a-1-aabbccdd"), &runner, "a", now)
        .await
        .unwrap();

    for op in [oplog::Operation::Create, oplog::Operation::QueueFinalize] {
        oplog::append(
            &pool,
            oplog::NewOperationLog {
                checkpoint_id: cp.id,
                runner_id: &runner,
                operation: op,
                backend: Some("bare_metal"),
                detail: "test".into(),
                result: oplog::OpResult::Ok,
                started_at: now,
                finished_at: now,
            },
        )
        .await
        .unwrap();
    }

    let logs = oplog::list_for_checkpoint(&pool, cp.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].operation, "create");
    assert_eq!(logs[1].operation, "queue_finalize");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn advisory_lock_excludes_second_holder() {
    let pool = test_pool().await;
    let runner = unique("r");

    let lock = RunnerLock::try_acquire(&pool, &runner)
        .await
        .unwrap()
        .expect("first acquire succeeds");
    assert!(RunnerLock::try_acquire(&pool, &runner)
        .await
        .unwrap()
        .is_none());

    assert!(lock.release().await.unwrap());
    assert!(RunnerLock::try_acquire(&pool, &runner)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn queue_claim_ack_and_retry_cycle() {
    let pool = test_pool().await;
    let name = unique("job-q-1-aabbccdd");

    queue::enqueue(&pool, &name).await.unwrap();
    let job = queue::claim(&pool, "w1", 300).await.unwrap().unwrap();
    assert_eq!(job.checkpoint_name, name);

    // Leased: nothing else can claim it. Other tests' jobs may be due,
    // so only assert ours stays invisible.
    while let Some(other) = queue::claim(&pool, "w2", 300).await.unwrap() {
        assert_ne!(other.checkpoint_name, name);
        queue::retry(&pool, other.id, 3600).await.unwrap();
    }

    // Retry with countdown pushes it into the future and drops the lease.
    queue::retry(&pool, job.id, 3600).await.unwrap();
    // Not due yet, so it cannot be claimed.
    while let Some(other) = queue::claim(&pool, "w3", 300).await.unwrap() {
        assert_ne!(other.checkpoint_name, name);
        queue::retry(&pool, other.id, 3600).await.unwrap();
    }

    queue::ack(&pool, job.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn runner_create_conflicts_then_reactivates() {
    let pool = test_pool().await;
    let runner_id = unique("r");

    let mut cfg = ep_core::RunnerConfig::new(&runner_id, ep_core::RunnerBackend::BareMetal);
    cfg.reset_cmd = Some("reset.sh".into());

    let created = runners::create(&pool, &cfg).await.unwrap();
    assert_eq!(created.config.token.len(), 64);

    let err = runners::create(&pool, &cfg).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRunner { .. }));

    assert!(runners::deactivate(&pool, &runner_id).await.unwrap());
    let revived = runners::create(&pool, &cfg).await.unwrap();
    assert!(revived.is_active);
    assert_ne!(revived.config.token, created.config.token);
}
