// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only operation audit log. Rows cascade with their checkpoint.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    QueueFinalize,
    Finalize,
    Gc,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::QueueFinalize => "queue_finalize",
            Operation::Finalize => "finalize",
            Operation::Gc => "gc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Ok,
    Error,
}

impl OpResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpResult::Ok => "ok",
            OpResult::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOperationLog<'a> {
    pub checkpoint_id: i64,
    pub runner_id: &'a str,
    pub operation: Operation,
    pub backend: Option<&'a str>,
    pub detail: String,
    pub result: OpResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A persisted log row (read back by tests and operators).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationLogEntry {
    pub id: i64,
    pub checkpoint_id: i64,
    pub runner_id: String,
    pub operation: String,
    pub backend: Option<String>,
    pub detail: Option<String>,
    pub result: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

pub async fn append<'e, E: PgExecutor<'e>>(
    exec: E,
    log: NewOperationLog<'_>,
) -> Result<(), StoreError> {
    let duration_ms = (log.finished_at - log.started_at).num_milliseconds();
    sqlx::query(
        "INSERT INTO operation_logs \
         (checkpoint_id, runner_id, operation, backend, detail, result, started_at, finished_at, duration_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(log.checkpoint_id)
    .bind(log.runner_id)
    .bind(log.operation.as_str())
    .bind(log.backend)
    .bind(&log.detail)
    .bind(log.result.as_str())
    .bind(log.started_at)
    .bind(log.finished_at)
    .bind(duration_ms)
    .execute(exec)
    .await?;
    Ok(())
}

/// All log rows for one checkpoint in append order.
pub async fn list_for_checkpoint<'e, E: PgExecutor<'e>>(
    exec: E,
    checkpoint_id: i64,
) -> Result<Vec<OperationLogEntry>, StoreError> {
    let rows = sqlx::query_as::<_, OperationLogEntry>(
        "SELECT id, checkpoint_id, runner_id, operation, backend, detail, result, \
                started_at, finished_at, duration_ms \
         FROM operation_logs WHERE checkpoint_id = $1 ORDER BY id",
    )
    .bind(checkpoint_id)
    .fetch_all(exec)
    .await?;
    Ok(rows)
}
