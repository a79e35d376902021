// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint service: create and queue-finalize.
//!
//! Each operation is one transaction. Creation is serialized per runner
//! twice over: the `FOR UPDATE` active-row lock inside the transaction
//! and the partial unique index as the backstop for concurrent creators.

use chrono::{Duration, Utc};
use ep_backends::Backend;
use ep_core::{
    generate_checkpoint_name, CheckpointState, FinalizeStatus, RunnerConfig, ServiceError,
    Settings,
};
use ep_store::{checkpoints, oplog, Checkpoint, StoreError};
use sqlx::PgPool;

fn store_err(e: StoreError) -> ServiceError {
    ServiceError::Internal(e.to_string())
}

/// Create a checkpoint for a job on a runner.
pub async fn create_checkpoint(
    pool: &PgPool,
    runner: &RunnerConfig,
    backend: &dyn Backend,
    job_id: &str,
    caller: Option<&str>,
    settings: &Settings,
) -> Result<Checkpoint, ServiceError> {
    let mut tx = pool.begin().await.map_err(|e| store_err(e.into()))?;

    // Cooldown: give the CI platform a beat to notice the runner is back
    // before the next job snapshots it.
    let recent = checkpoints::most_recent_finalized(&mut *tx, &runner.runner_id)
        .await
        .map_err(store_err)?;
    if let Some(finalized_at) = recent.and_then(|cp| cp.finalized_at) {
        let elapsed = Utc::now() - finalized_at;
        if elapsed < Duration::seconds(settings.finalize_cooldown_seconds) {
            return Err(ServiceError::Cooldown);
        }
    }

    let active = checkpoints::active_for_runner(&mut *tx, &runner.runner_id, true)
        .await
        .map_err(store_err)?;
    if let Some(active) = active {
        return Err(ServiceError::Conflict(format!(
            "Active checkpoint '{}' already exists for runner '{}'",
            active.name, runner.runner_id
        )));
    }

    let name = generate_checkpoint_name(job_id, Utc::now().timestamp());

    let started = Utc::now();
    backend
        .create_checkpoint(runner, &name)
        .await
        .map_err(|e| ServiceError::Backend(e.to_string()))?;
    let finished = Utc::now();

    let checkpoint = match checkpoints::insert(&mut *tx, &name, &runner.runner_id, job_id, started)
        .await
    {
        Ok(checkpoint) => checkpoint,
        Err(StoreError::DuplicateActive { runner_id }) => {
            return Err(ServiceError::Conflict(format!(
                "Active checkpoint already exists for runner '{runner_id}' (concurrent create)"
            )));
        }
        Err(e) => return Err(store_err(e)),
    };

    let mut detail = format!("Checkpoint created for job {job_id}");
    if let Some(caller) = caller {
        detail.push_str(&format!(", caller={caller}"));
    }
    oplog::append(
        &mut *tx,
        oplog::NewOperationLog {
            checkpoint_id: checkpoint.id,
            runner_id: &runner.runner_id,
            operation: oplog::Operation::Create,
            backend: Some(runner.backend.as_str()),
            detail,
            result: oplog::OpResult::Ok,
            started_at: started,
            finished_at: finished,
        },
    )
    .await
    .map_err(store_err)?;

    tx.commit().await.map_err(|e| store_err(e.into()))?;
    Ok(checkpoint)
}

/// Queue a checkpoint for finalization.
///
/// Returns `(checkpoint, already_finalized)`; repeat calls are
/// idempotent regardless of the requested status.
pub async fn queue_finalize(
    pool: &PgPool,
    checkpoint_name: &str,
    status: FinalizeStatus,
    source: &str,
) -> Result<(Checkpoint, bool), ServiceError> {
    let mut tx = pool.begin().await.map_err(|e| store_err(e.into()))?;

    let checkpoint = checkpoints::find_by_name(&mut *tx, checkpoint_name)
        .await
        .map_err(store_err)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Checkpoint '{checkpoint_name}' not found"))
        })?;

    if checkpoint.state == CheckpointState::FinalizeQueued || checkpoint.state.is_terminal() {
        return Ok((checkpoint, true));
    }
    if checkpoint.state != CheckpointState::Created {
        return Err(ServiceError::Conflict(format!(
            "Checkpoint '{checkpoint_name}' in state '{}', cannot finalize",
            checkpoint.state
        )));
    }

    let now = Utc::now();
    let updated = checkpoints::mark_finalize_queued(&mut *tx, checkpoint.id, status, source, now)
        .await
        .map_err(store_err)?;

    oplog::append(
        &mut *tx,
        oplog::NewOperationLog {
            checkpoint_id: updated.id,
            runner_id: &updated.runner_id,
            operation: oplog::Operation::QueueFinalize,
            backend: None,
            detail: format!("Finalize queued: status={status}, source={source}"),
            result: oplog::OpResult::Ok,
            started_at: now,
            finished_at: now,
        },
    )
    .await
    .map_err(store_err)?;

    tx.commit().await.map_err(|e| store_err(e.into()))?;
    Ok((updated, false))
}

pub async fn get_by_name(
    pool: &PgPool,
    checkpoint_name: &str,
) -> Result<Option<Checkpoint>, ServiceError> {
    checkpoints::find_by_name(pool, checkpoint_name)
        .await
        .map_err(store_err)
}

pub async fn get_active_for_runner(
    pool: &PgPool,
    runner_id: &str,
) -> Result<Option<Checkpoint>, ServiceError> {
    checkpoints::active_for_runner(pool, runner_id, false)
        .await
        .map_err(store_err)
}
