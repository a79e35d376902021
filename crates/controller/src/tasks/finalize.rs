// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The finalize worker.
//!
//! Consumes one queued checkpoint name and drives the pause → reset →
//! check-ready → unpause sequence under the runner's advisory lock.
//! Every terminal job status resets the runner; the next job always
//! starts from a clean snapshot.

use chrono::Utc;
use ep_core::CheckpointState;
use ep_store::{checkpoints, oplog, queue, RunnerLock};

use super::{TaskError, WorkerCtx};

#[derive(Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Runner reset, row in `reset`.
    Completed,
    /// Nothing to do (missing row, raced state change, missing runner).
    Skipped(&'static str),
    /// Another worker holds the runner; retry with a countdown.
    LockBusy,
}

/// Execute one finalize task.
pub async fn run_finalize(
    ctx: &WorkerCtx,
    checkpoint_name: &str,
) -> Result<FinalizeOutcome, TaskError> {
    let Some(checkpoint) = checkpoints::find_by_name(&ctx.pool, checkpoint_name).await? else {
        tracing::warn!(name = %checkpoint_name, "checkpoint not found");
        return Ok(FinalizeOutcome::Skipped("not found"));
    };
    if checkpoint.state != CheckpointState::FinalizeQueued {
        tracing::info!(
            name = %checkpoint_name,
            state = %checkpoint.state,
            "checkpoint not in finalize_queued state"
        );
        return Ok(FinalizeOutcome::Skipped("not queued"));
    }

    let runner_id = checkpoint.runner_id.clone();
    let inventory = ctx.inventory.get().await?;
    let Some(runner) = inventory.get_runner(&runner_id) else {
        tracing::error!(runner_id = %runner_id, "runner not found in inventory");
        return Ok(FinalizeOutcome::Skipped("runner missing"));
    };

    let Some(lock) = RunnerLock::try_acquire(&ctx.pool, &runner_id).await? else {
        tracing::warn!(runner_id = %runner_id, "could not acquire lock");
        return Ok(FinalizeOutcome::LockBusy);
    };

    // Re-verify under the lock; another worker may have finished it
    // between our first read and the acquisition.
    let result = finalize_locked(ctx, checkpoint_name, runner).await;

    if let Err(e) = lock.release().await {
        tracing::warn!(runner_id = %runner_id, error = %e, "failed to release advisory lock");
    }
    result
}

async fn finalize_locked(
    ctx: &WorkerCtx,
    checkpoint_name: &str,
    runner: &ep_core::RunnerConfig,
) -> Result<FinalizeOutcome, TaskError> {
    let Some(checkpoint) = checkpoints::find_by_name(&ctx.pool, checkpoint_name).await? else {
        return Ok(FinalizeOutcome::Skipped("not found"));
    };
    if checkpoint.state != CheckpointState::FinalizeQueued {
        tracing::info!(
            name = %checkpoint_name,
            state = %checkpoint.state,
            "checkpoint state changed after lock acquisition"
        );
        return Ok(FinalizeOutcome::Skipped("raced"));
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
        let pause_result = pause_if_configured(ctx, runner, &mut paused).await;
        match pause_result {
            Err(e) => Err(e),
            Ok(()) => {
                let inner: Result<(), TaskError> = async {
                    backend.reset(runner, checkpoint_name).await?;
                    backend.check_ready(runner).await?;
                    Ok(())
                }
                .await;
                // Unpause on both paths; failure here must not mask the
                // primary outcome.
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
            let updated =
                checkpoints::set_state(&mut *tx, checkpoint.id, CheckpointState::Reset).await?;
            oplog::append(
                &mut *tx,
                oplog::NewOperationLog {
                    checkpoint_id: checkpoint.id,
                    runner_id: &checkpoint.runner_id,
                    operation: oplog::Operation::Finalize,
                    backend: Some(runner.backend.as_str()),
                    detail: format!(
                        "Finalized: status={}, new_state={}",
                        checkpoint
                            .finalize_status
                            .map(|s| s.as_str())
                            .unwrap_or("unknown"),
                        updated.state
                    ),
                    result: oplog::OpResult::Ok,
                    started_at: started,
                    finished_at: finished,
                },
            )
            .await?;
            tx.commit().await.map_err(ep_store::StoreError::from)?;

            tracing::info!(
                checkpoint = %checkpoint_name,
                state = %updated.state,
                duration_ms = (finished - started).num_milliseconds(),
                "Finalize complete"
            );
            Ok(FinalizeOutcome::Completed)
        }
        Err(e) => {
            // Last-resort unpause: the guarded region clears `paused` on
            // its own paths, so this only fires if it was interrupted.
            if paused {
                unpause_quietly(ctx, runner).await;
            }
            let log = oplog::NewOperationLog {
                checkpoint_id: checkpoint.id,
                runner_id: &checkpoint.runner_id,
                operation: oplog::Operation::Finalize,
                backend: Some(runner.backend.as_str()),
                detail: format!("Finalize failed: {e}"),
                result: oplog::OpResult::Error,
                started_at: started,
                finished_at: finished,
            };
            if let Err(log_err) = oplog::append(&ctx.pool, log).await {
                tracing::warn!(error = %log_err, "failed to record finalize error");
            }
            tracing::error!(checkpoint = %checkpoint_name, error = %e, "Finalize failed");
            Err(e)
        }
    }
}

pub(super) async fn pause_if_configured(
    ctx: &WorkerCtx,
    runner: &ep_core::RunnerConfig,
    paused: &mut bool,
) -> Result<(), TaskError> {
    let Some(ci_runner_id) = runner.ci_runner_id else {
        return Ok(());
    };
    let Some(ci) = &ctx.ci else {
        tracing::warn!(
            runner_id = %runner.runner_id,
            "runner has a CI handle but no CI adapter is configured, skipping pause"
        );
        return Ok(());
    };
    ci.pause_runner(ci_runner_id).await?;
    *paused = true;
    Ok(())
}

pub(super) async fn unpause_quietly(ctx: &WorkerCtx, runner: &ep_core::RunnerConfig) {
    let (Some(ci_runner_id), Some(ci)) = (runner.ci_runner_id, &ctx.ci) else {
        return;
    };
    if let Err(e) = ci.unpause_runner(ci_runner_id).await {
        tracing::error!(
            runner_id = %runner.runner_id,
            error = %e,
            "Failed to unpause runner after reset"
        );
    }
}

/// Enqueue a finalize task, logging instead of failing the caller.
/// Used by paths where the DB transition is already committed and the
/// reconciler is the safety net.
pub(crate) async fn enqueue_or_log(pool: &sqlx::PgPool, checkpoint_name: &str) -> bool {
    match queue::enqueue(pool, checkpoint_name).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                checkpoint = %checkpoint_name,
                error = %e,
                "failed to enqueue finalize task"
            );
            false
        }
    }
}
