// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Garbage collector for abandoned checkpoints.
//!
//! A checkpoint that sits in `created` past its TTL belongs to a job
//! whose terminal status never arrived (lost webhook, dead poller, CI
//! outage). The GC resets the runner exactly like the finalize worker
//! and parks the row in `gc_reset`. One bad checkpoint never aborts the
//! pass.

use chrono::{Duration, Utc};
use ep_core::CheckpointState;
use ep_store::{checkpoints, oplog, Checkpoint, RunnerLock};

use super::finalize::{pause_if_configured, unpause_quietly};
use super::{TaskError, WorkerCtx};

/// One GC pass. Returns the number of checkpoints reset.
pub async fn gc_stale_checkpoints(ctx: &WorkerCtx) -> Result<u64, TaskError> {
    let cutoff = Utc::now() - Duration::seconds(ctx.settings.checkpoint_ttl_seconds);
    let mut reset_count = 0;
    let mut last_id = 0;

    loop {
        let batch = checkpoints::page_created_before(
            &ctx.pool,
            cutoff,
            last_id,
            ctx.settings.query_batch_size,
        )
        .await?;
        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.id;

        for checkpoint in &batch {
            match gc_one(ctx, checkpoint).await {
                Ok(true) => reset_count += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        checkpoint = %checkpoint.name,
                        error = %e,
                        "GC failed for checkpoint"
                    );
                }
            }
        }
    }

    if reset_count > 0 {
        tracing::info!(count = reset_count, "GC reset stale checkpoints");
    }
    Ok(reset_count)
}

/// Reset a single stale checkpoint. `Ok(false)` means skipped.
async fn gc_one(ctx: &WorkerCtx, checkpoint: &Checkpoint) -> Result<bool, TaskError> {
    let inventory = ctx.inventory.get().await?;
    let Some(runner) = inventory.get_runner(&checkpoint.runner_id) else {
        tracing::warn!(runner_id = %checkpoint.runner_id, "GC: runner not in inventory");
        return Ok(false);
    };

    let Some(lock) = RunnerLock::try_acquire(&ctx.pool, &checkpoint.runner_id).await? else {
        tracing::warn!(runner_id = %checkpoint.runner_id, "GC: could not acquire lock, skipping");
        return Ok(false);
    };

    let result = gc_locked(ctx, checkpoint, runner).await;

    if let Err(e) = lock.release().await {
        tracing::warn!(
            runner_id = %checkpoint.runner_id,
            error = %e,
            "GC: failed to release advisory lock"
        );
    }
    result
}

async fn gc_locked(
    ctx: &WorkerCtx,
    checkpoint: &Checkpoint,
    runner: &ep_core::RunnerConfig,
) -> Result<bool, TaskError> {
    // Re-verify state under the lock.
    let Some(current) = checkpoints::find_by_name(&ctx.pool, &checkpoint.name).await? else {
        return Ok(false);
    };
    if current.state != CheckpointState::Created {
        tracing::info!(
            checkpoint = %checkpoint.name,
            state = %current.state,
            "GC: checkpoint state changed after lock"
        );
        return Ok(false);
    }

    let Some(backend) = ctx.backends.for_runner(runner) else {
        return Err(TaskError::Fatal(format!(
            "no backend registered for '{}'",
            runner.backend
        )));
    };

    let started = Utc::now();
    let mut paused = false;

    let reset_result: Result<(), TaskError> = {
        match pause_if_configured(ctx, runner, &mut paused).await {
            Err(e) => Err(e),
            Ok(()) => {
                let inner: Result<(), TaskError> = async {
                    backend.reset(runner, &checkpoint.name).await?;
                    backend.check_ready(runner).await?;
                    Ok(())
                }
                .await;
                if paused {
                    unpause_quietly(ctx, runner).await;
                    paused = false;
                }
                inner
            }
        }
    };
    let finished = Utc::now();

    match reset_result {
        Ok(()) => {
            let mut tx = ctx.pool.begin().await.map_err(ep_store::StoreError::from)?;
            checkpoints::set_state(&mut *tx, checkpoint.id, CheckpointState::GcReset).await?;
            oplog::append(
                &mut *tx,
                oplog::NewOperationLog {
                    checkpoint_id: checkpoint.id,
                    runner_id: &checkpoint.runner_id,
                    operation: oplog::Operation::Gc,
                    backend: Some(runner.backend.as_str()),
                    detail: "Stale checkpoint reset by GC".to_string(),
                    result: oplog::OpResult::Ok,
                    started_at: started,
                    finished_at: finished,
                },
            )
            .await?;
            tx.commit().await.map_err(ep_store::StoreError::from)?;

            tracing::info!(
                checkpoint = %checkpoint.name,
                duration_ms = (finished - started).num_milliseconds(),
                "GC reset checkpoint"
            );
            Ok(true)
        }
        Err(e) => {
            if paused {
                unpause_quietly(ctx, runner).await;
            }
            let log = oplog::NewOperationLog {
                checkpoint_id: checkpoint.id,
                runner_id: &checkpoint.runner_id,
                operation: oplog::Operation::Gc,
                backend: Some(runner.backend.as_str()),
                detail: format!("GC reset failed: {e}"),
                result: oplog::OpResult::Error,
                started_at: started,
                finished_at: finished,
            };
            if let Err(log_err) = oplog::append(&ctx.pool, log).await {
                tracing::warn!(error = %log_err, "GC: failed to record error");
            }
            Err(e)
        }
    }
}
