// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI status poller.
//!
//! Fallback terminal-status source for installs without webhooks. Young
//! checkpoints are skipped so the poller never races a job's first
//! status transitions; per-item CI errors never abort the scan.

use chrono::Utc;

use super::{TaskError, WorkerCtx};
use crate::service;

/// One poller pass. Returns the number of finalizations queued.
pub async fn poll_active_checkpoints(ctx: &WorkerCtx) -> Result<u64, TaskError> {
    if !ctx.settings.poller_enabled {
        return Ok(0);
    }
    let Some(ci) = &ctx.ci else {
        tracing::warn!("poller enabled but no CI adapter configured");
        return Ok(0);
    };

    let inventory = ctx.inventory.get().await?;
    let mut queued = 0;
    let mut last_id = 0;

    loop {
        let batch =
            ep_store::checkpoints::page_created(&ctx.pool, last_id, ctx.settings.query_batch_size)
                .await?;
        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.id;

        for checkpoint in &batch {
            let age = (Utc::now() - checkpoint.created_at).num_seconds();
            if age < ctx.settings.poller_min_age_seconds {
                continue;
            }
            if inventory.get_runner(&checkpoint.runner_id).is_none() {
                continue;
            }

            let status = match ci.job_status(&checkpoint.job_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!(
                        job_id = %checkpoint.job_id,
                        error = %e,
                        "Failed to poll job status"
                    );
                    continue;
                }
            };
            let Some(finalize_status) = status.as_finalize_status() else {
                continue;
            };

            match service::queue_finalize(&ctx.pool, &checkpoint.name, finalize_status, "poller")
                .await
            {
                Ok((_, true)) => {}
                Ok((_, false)) => {
                    if !super::enqueue_or_log(&ctx.pool, &checkpoint.name).await {
                        // The reconciler re-enqueues committed rows.
                        continue;
                    }
                    queued += 1;
                    tracing::info!(
                        checkpoint = %checkpoint.name,
                        status = %status,
                        "Poller queued finalize"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        checkpoint = %checkpoint.name,
                        error = %e,
                        "Poller failed to queue finalize"
                    );
                }
            }
        }
    }

    Ok(queued)
}
