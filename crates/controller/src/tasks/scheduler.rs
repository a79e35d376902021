// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler process: emits the periodic GC, poller, and reconciler
//! passes. Exactly one scheduler runs per install; the passes themselves
//! are lock-guarded and idempotent, so an accidental overlap with a
//! manual run is harmless.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{gc_stale_checkpoints, poll_active_checkpoints, reconcile_stuck_checkpoints};
use super::{TaskError, WorkerCtx};

pub async fn run_scheduler(ctx: WorkerCtx, shutdown: CancellationToken) -> Result<(), TaskError> {
    let mut gc_tick =
        tokio::time::interval(Duration::from_secs(ctx.settings.gc_interval_seconds));
    let mut poll_tick =
        tokio::time::interval(Duration::from_secs(ctx.settings.poller_interval_seconds));
    let mut reconcile_tick = tokio::time::interval(Duration::from_secs(
        ctx.settings.reconcile_interval_seconds,
    ));
    // The immediate first tick of each interval doubles as the startup
    // pass.
    tracing::info!("scheduler started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = gc_tick.tick() => {
                run_pass(
                    "gc",
                    Duration::from_secs(ctx.settings.task_hard_time_limit),
                    gc_stale_checkpoints(&ctx),
                )
                .await;
            }
            _ = poll_tick.tick() => {
                run_pass(
                    "poller",
                    Duration::from_secs(ctx.settings.poller_hard_time_limit),
                    poll_active_checkpoints(&ctx),
                )
                .await;
            }
            _ = reconcile_tick.tick() => {
                run_pass(
                    "reconcile",
                    Duration::from_secs(ctx.settings.task_hard_time_limit),
                    reconcile_stuck_checkpoints(&ctx.pool, ctx.settings.query_batch_size),
                )
                .await;
            }
        }
    }

    tracing::info!("scheduler stopped");
    Ok(())
}

async fn run_pass<F>(name: &str, limit: Duration, pass: F)
where
    F: std::future::Future<Output = Result<u64, TaskError>>,
{
    match tokio::time::timeout(limit, pass).await {
        Ok(Ok(count)) => {
            tracing::debug!(pass = name, count, "periodic pass complete");
        }
        Ok(Err(e)) => {
            tracing::error!(pass = name, error = %e, "periodic pass failed");
        }
        Err(_) => {
            tracing::error!(pass = name, limit_secs = limit.as_secs(), "periodic pass timed out");
        }
    }
}
