// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable at-least-once finalize queue.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` plus a lease. A job is
//! acknowledged (deleted) only after its handler returns; a worker that
//! dies mid-task lets the lease lapse and the job becomes claimable
//! again. Retry-with-countdown reschedules `run_at` and clears the lease.

use sqlx::PgExecutor;

use crate::error::StoreError;

/// A claimed queue entry.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: i64,
    pub checkpoint_name: String,
    pub attempts: i32,
}

/// Enqueue a finalize task for `checkpoint_name`.
pub async fn enqueue<'e, E: PgExecutor<'e>>(
    exec: E,
    checkpoint_name: &str,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO finalize_jobs (checkpoint_name) VALUES ($1)")
        .bind(checkpoint_name)
        .execute(exec)
        .await?;
    Ok(())
}

/// Claim the oldest due job under a lease, skipping rows other workers
/// hold. Returns `None` when the queue is empty.
pub async fn claim<'e, E: PgExecutor<'e>>(
    exec: E,
    worker_id: &str,
    lease_seconds: i64,
) -> Result<Option<QueuedJob>, StoreError> {
    let job = sqlx::query_as::<_, QueuedJob>(
        "UPDATE finalize_jobs \
         SET locked_by = $1, locked_until = now() + make_interval(secs => $2) \
         WHERE id = ( \
             SELECT id FROM finalize_jobs \
             WHERE run_at <= now() AND (locked_until IS NULL OR locked_until < now()) \
             ORDER BY id LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING id, checkpoint_name, attempts",
    )
    .bind(worker_id)
    .bind(lease_seconds as f64)
    .fetch_optional(exec)
    .await?;
    Ok(job)
}

/// Acknowledge a completed job.
pub async fn ack<'e, E: PgExecutor<'e>>(exec: E, id: i64) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM finalize_jobs WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(())
}

/// Reschedule a job `countdown_seconds` into the future, bumping its
/// attempt counter and dropping the lease.
pub async fn retry<'e, E: PgExecutor<'e>>(
    exec: E,
    id: i64,
    countdown_seconds: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE finalize_jobs \
         SET attempts = attempts + 1, \
             run_at = now() + make_interval(secs => $2), \
             locked_by = NULL, locked_until = NULL \
         WHERE id = $1",
    )
    .bind(id)
    .bind(countdown_seconds as f64)
    .execute(exec)
    .await?;
    Ok(())
}
