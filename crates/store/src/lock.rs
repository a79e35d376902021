// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-runner advisory locks.
//!
//! Postgres session-level advisory locks are scoped to one connection,
//! so the guard owns a dedicated pooled connection for its lifetime.
//! Dropping a guard without releasing would return a still-locked
//! connection to the pool; the Drop impl closes the connection instead,
//! which releases the lock server-side.

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::error::StoreError;

/// Deterministic 31-bit lock key: CRC32 of the runner id's UTF-8 bytes
/// with the high bit cleared. Must stay stable across installs.
pub fn runner_lock_id(runner_id: &str) -> i32 {
    (crc32fast::hash(runner_id.as_bytes()) & 0x7FFF_FFFF) as i32
}

/// Try to take the advisory lock on the given connection. Non-blocking;
/// `false` is a normal "someone else holds it" signal.
pub async fn try_advisory_lock(
    conn: &mut PgConnection,
    runner_id: &str,
) -> Result<bool, StoreError> {
    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(runner_lock_id(runner_id))
        .fetch_one(conn)
        .await?;
    Ok(acquired)
}

/// Release the advisory lock on the same connection that acquired it.
pub async fn release_advisory_lock(
    conn: &mut PgConnection,
    runner_id: &str,
) -> Result<bool, StoreError> {
    let released = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
        .bind(runner_lock_id(runner_id))
        .fetch_one(conn)
        .await?;
    Ok(released)
}

/// Guard holding the advisory lock for one runner.
pub struct RunnerLock {
    conn: Option<PoolConnection<Postgres>>,
    runner_id: String,
}

impl RunnerLock {
    /// Attempt to acquire the lock on a fresh pooled connection.
    /// Returns `None` when another worker holds it.
    pub async fn try_acquire(pool: &PgPool, runner_id: &str) -> Result<Option<Self>, StoreError> {
        let mut conn = pool.acquire().await?;
        if try_advisory_lock(&mut conn, runner_id).await? {
            Ok(Some(Self {
                conn: Some(conn),
                runner_id: runner_id.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    /// Release the lock and return the connection to the pool.
    pub async fn release(mut self) -> Result<bool, StoreError> {
        match self.conn.take() {
            Some(mut conn) => release_advisory_lock(&mut conn, &self.runner_id).await,
            None => Ok(false),
        }
    }
}

impl Drop for RunnerLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Unreleased guard: close the connection so the session lock
            // dies with it rather than riding back into the pool.
            let runner_id = self.runner_id.clone();
            tokio::spawn(async move {
                let conn = conn.detach();
                if let Err(e) = sqlx::Connection::close(conn).await {
                    tracing::warn!(runner_id = %runner_id, error = %e, "failed to close lock connection");
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
