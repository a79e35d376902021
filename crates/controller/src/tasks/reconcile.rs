// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation: re-enqueue checkpoints stuck in `finalize_queued`.
//!
//! A row lands there permanently only when its queue job was lost (a
//! worker died past its lease retries, or the enqueue after commit
//! failed). Re-enqueuing is idempotent: the worker re-checks state
//! under the lock before doing anything.

use ep_store::{checkpoints, queue};
use sqlx::PgPool;

use super::TaskError;

/// Scan `finalize_queued` rows and re-enqueue each. Returns how many
/// were enqueued; per-item failures are logged and retried next pass.
pub async fn reconcile_stuck_checkpoints(
    pool: &PgPool,
    batch_size: i64,
) -> Result<u64, TaskError> {
    let mut enqueued = 0;
    let mut last_id = 0;

    loop {
        let batch = checkpoints::page_finalize_queued(pool, last_id, batch_size).await?;
        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.id;

        for checkpoint in &batch {
            tracing::info!(
                checkpoint = %checkpoint.name,
                runner_id = %checkpoint.runner_id,
                finalize_status = ?checkpoint.finalize_status.map(|s| s.as_str()),
                "Reconcile: re-enqueuing stuck checkpoint"
            );
            match queue::enqueue(pool, &checkpoint.name).await {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    tracing::error!(
                        checkpoint = %checkpoint.name,
                        error = %e,
                        "Reconcile: failed to enqueue checkpoint"
                    );
                }
            }
        }
    }

    Ok(enqueued)
}

/// Run reconciliation once at controller startup.
pub async fn reconcile_on_startup(pool: &PgPool, batch_size: i64) -> Result<(), TaskError> {
    let enqueued = reconcile_stuck_checkpoints(pool, batch_size).await?;
    if enqueued > 0 {
        tracing::info!(count = enqueued, "Reconcile: re-enqueued stuck checkpoints");
    } else {
        tracing::info!("Reconcile: no stuck checkpoints found");
    }
    Ok(())
}
