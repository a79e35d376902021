// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue worker loop.
//!
//! Claims finalize jobs under a lease and drives [`run_finalize`] with
//! soft and hard time limits. Tasks are acknowledged after the handler
//! returns; a worker death mid-task lets the lease lapse and the job is
//! redelivered. Lock-busy tasks retry with a countdown a bounded number
//! of times, then fall to the reconciler.

use std::time::Duration;

use ep_store::queue;
use tokio_util::sync::CancellationToken;

use super::finalize::{run_finalize, FinalizeOutcome};
use super::{TaskError, WorkerCtx};

/// Run the worker until `shutdown` fires.
pub async fn run_worker(ctx: WorkerCtx, shutdown: CancellationToken) -> Result<(), TaskError> {
    let worker_id = format!("worker-{}", ep_wire::new_message_id());
    let idle = Duration::from_millis(ctx.settings.queue_idle_sleep_ms);
    tracing::info!(worker_id = %worker_id, "finalize worker started");

    while !shutdown.is_cancelled() {
        let job = queue::claim(&ctx.pool, &worker_id, ctx.settings.queue_lease_seconds).await;
        let job = match job {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(idle) => continue,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "queue claim failed");
                tokio::time::sleep(idle).await;
                continue;
            }
        };

        process_job(&ctx, &job).await;
    }

    tracing::info!(worker_id = %worker_id, "finalize worker stopped");
    Ok(())
}

async fn process_job(ctx: &WorkerCtx, job: &queue::QueuedJob) {
    let soft = Duration::from_secs(ctx.settings.task_soft_time_limit);
    let hard = Duration::from_secs(ctx.settings.task_hard_time_limit);

    let outcome = run_with_limits(ctx, &job.checkpoint_name, soft, hard).await;

    match outcome {
        Ok(FinalizeOutcome::Completed) | Ok(FinalizeOutcome::Skipped(_)) => {
            ack_or_log(ctx, job.id).await;
        }
        Ok(FinalizeOutcome::LockBusy) => {
            if job.attempts < ctx.settings.finalize_max_retries {
                let countdown = ctx.settings.finalize_retry_countdown_seconds;
                tracing::info!(
                    checkpoint = %job.checkpoint_name,
                    attempt = job.attempts + 1,
                    countdown,
                    "runner locked, retrying finalize"
                );
                if let Err(e) = queue::retry(&ctx.pool, job.id, countdown).await {
                    tracing::error!(error = %e, "failed to schedule retry");
                }
            } else {
                tracing::warn!(
                    checkpoint = %job.checkpoint_name,
                    "giving up after lock retries; reconciler will re-enqueue"
                );
                ack_or_log(ctx, job.id).await;
            }
        }
        Err(e) => {
            // The row is still finalize_queued; reconciliation recovers it.
            tracing::error!(
                checkpoint = %job.checkpoint_name,
                error = %e,
                "finalize task failed"
            );
            ack_or_log(ctx, job.id).await;
        }
    }
}

/// Soft limit logs and keeps waiting; the hard limit cancels the task.
/// Cancellation is safe: the advisory-lock guard closes its connection
/// on drop, which releases the lock server-side.
async fn run_with_limits(
    ctx: &WorkerCtx,
    checkpoint_name: &str,
    soft: Duration,
    hard: Duration,
) -> Result<FinalizeOutcome, TaskError> {
    let work = run_finalize(ctx, checkpoint_name);
    tokio::pin!(work);

    match tokio::time::timeout(soft, &mut work).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                checkpoint = %checkpoint_name,
                limit_secs = soft.as_secs(),
                "finalize exceeded its soft time limit"
            );
            let remaining = hard.saturating_sub(soft);
            match tokio::time::timeout(remaining, &mut work).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(
                        checkpoint = %checkpoint_name,
                        limit_secs = hard.as_secs(),
                        "finalize exceeded its hard time limit, cancelling"
                    );
                    Err(TaskError::HardTimeout)
                }
            }
        }
    }
}

async fn ack_or_log(ctx: &WorkerCtx, job_id: i64) {
    if let Err(e) = queue::ack(&ctx.pool, job_id).await {
        tracing::error!(job_id, error = %e, "failed to ack queue job");
    }
}
