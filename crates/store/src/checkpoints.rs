// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint repository.
//!
//! All functions take an executor so callers decide the transaction
//! boundary; the service layer wraps create/queue-finalize in one
//! transaction each.

use chrono::{DateTime, Utc};
use ep_core::{CheckpointState, FinalizeStatus};
use sqlx::PgExecutor;

use crate::error::{is_unique_violation, StoreError};

const COLUMNS: &str =
    "id, name, runner_id, job_id, state, finalize_status, finalize_source, created_at, finalized_at";

/// A checkpoint row with typed state fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub id: i64,
    pub name: String,
    pub runner_id: String,
    pub job_id: String,
    pub state: CheckpointState,
    pub finalize_status: Option<FinalizeStatus>,
    pub finalize_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: i64,
    name: String,
    runner_id: String,
    job_id: String,
    state: String,
    finalize_status: Option<String>,
    finalize_source: Option<String>,
    created_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = StoreError;

    fn try_from(row: CheckpointRow) -> Result<Self, StoreError> {
        let state = CheckpointState::parse(&row.state)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown state '{}'", row.state)))?;
        let finalize_status = match &row.finalize_status {
            None => None,
            Some(s) => Some(FinalizeStatus::parse(s).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown finalize_status '{s}'"))
            })?),
        };
        Ok(Checkpoint {
            id: row.id,
            name: row.name,
            runner_id: row.runner_id,
            job_id: row.job_id,
            state,
            finalize_status,
            finalize_source: row.finalize_source,
            created_at: row.created_at,
            finalized_at: row.finalized_at,
        })
    }
}

/// Insert a new checkpoint in state `created`.
///
/// A violation of the partial unique index means another transaction won
/// the race for this runner; that surfaces as `DuplicateActive`.
pub async fn insert<'e, E: PgExecutor<'e>>(
    exec: E,
    name: &str,
    runner_id: &str,
    job_id: &str,
    created_at: DateTime<Utc>,
) -> Result<Checkpoint, StoreError> {
    let sql = format!(
        "INSERT INTO checkpoints (name, runner_id, job_id, state, created_at) \
         VALUES ($1, $2, $3, 'created', $4) RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(name)
        .bind(runner_id)
        .bind(job_id)
        .bind(created_at)
        .fetch_one(exec)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "ix_one_active_checkpoint_per_runner") {
                StoreError::DuplicateActive {
                    runner_id: runner_id.to_string(),
                }
            } else if is_unique_violation(&e, "checkpoints_name_key") {
                StoreError::DuplicateName {
                    name: name.to_string(),
                }
            } else {
                StoreError::Database(e)
            }
        })?;
    row.try_into()
}

pub async fn find_by_name<'e, E: PgExecutor<'e>>(
    exec: E,
    name: &str,
) -> Result<Option<Checkpoint>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM checkpoints WHERE name = $1");
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(name)
        .fetch_optional(exec)
        .await?;
    row.map(Checkpoint::try_from).transpose()
}

/// Latest checkpoint for a CI job id (webhook lookup path).
pub async fn find_by_job_id<'e, E: PgExecutor<'e>>(
    exec: E,
    job_id: &str,
) -> Result<Option<Checkpoint>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM checkpoints WHERE job_id = $1 ORDER BY id DESC LIMIT 1");
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(job_id)
        .fetch_optional(exec)
        .await?;
    row.map(Checkpoint::try_from).transpose()
}

/// The runner's active checkpoint, if any. With `for_update` the row is
/// locked for the rest of the transaction, serializing concurrent creates.
pub async fn active_for_runner<'e, E: PgExecutor<'e>>(
    exec: E,
    runner_id: &str,
    for_update: bool,
) -> Result<Option<Checkpoint>, StoreError> {
    let suffix = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!(
        "SELECT {COLUMNS} FROM checkpoints \
         WHERE runner_id = $1 AND state IN ('created', 'finalize_queued'){suffix}"
    );
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(runner_id)
        .fetch_optional(exec)
        .await?;
    row.map(Checkpoint::try_from).transpose()
}

/// Most recently finalized checkpoint for a runner (cooldown check).
pub async fn most_recent_finalized<'e, E: PgExecutor<'e>>(
    exec: E,
    runner_id: &str,
) -> Result<Option<Checkpoint>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM checkpoints \
         WHERE runner_id = $1 AND finalized_at IS NOT NULL \
         ORDER BY finalized_at DESC LIMIT 1"
    );
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(runner_id)
        .fetch_optional(exec)
        .await?;
    row.map(Checkpoint::try_from).transpose()
}

/// Atomically move `created` → `finalize_queued`, stamping status, source
/// and `finalized_at`. Returns the updated row.
pub async fn mark_finalize_queued<'e, E: PgExecutor<'e>>(
    exec: E,
    id: i64,
    status: FinalizeStatus,
    source: &str,
    finalized_at: DateTime<Utc>,
) -> Result<Checkpoint, StoreError> {
    let sql = format!(
        "UPDATE checkpoints \
         SET state = 'finalize_queued', finalize_status = $2, finalize_source = $3, finalized_at = $4 \
         WHERE id = $1 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(id)
        .bind(status.as_str())
        .bind(source)
        .bind(finalized_at)
        .fetch_one(exec)
        .await?;
    row.try_into()
}

/// Set a terminal state (`reset` from the finalize worker, `gc_reset`
/// from the garbage collector).
pub async fn set_state<'e, E: PgExecutor<'e>>(
    exec: E,
    id: i64,
    state: CheckpointState,
) -> Result<Checkpoint, StoreError> {
    let sql = format!("UPDATE checkpoints SET state = $2 WHERE id = $1 RETURNING {COLUMNS}");
    let row = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(id)
        .bind(state.as_str())
        .fetch_one(exec)
        .await?;
    row.try_into()
}

/// Keyset page of `created` rows older than `cutoff` (GC scan). Rows at
/// exactly the cutoff are included.
pub async fn page_created_before<'e, E: PgExecutor<'e>>(
    exec: E,
    cutoff: DateTime<Utc>,
    last_id: i64,
    limit: i64,
) -> Result<Vec<Checkpoint>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM checkpoints \
         WHERE state = 'created' AND created_at <= $1 AND id > $2 \
         ORDER BY id LIMIT $3"
    );
    let rows = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(cutoff)
        .bind(last_id)
        .bind(limit)
        .fetch_all(exec)
        .await?;
    rows.into_iter().map(Checkpoint::try_from).collect()
}

/// Keyset page of all `created` rows (poller scan).
pub async fn page_created<'e, E: PgExecutor<'e>>(
    exec: E,
    last_id: i64,
    limit: i64,
) -> Result<Vec<Checkpoint>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM checkpoints \
         WHERE state = 'created' AND id > $1 ORDER BY id LIMIT $2"
    );
    let rows = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(last_id)
        .bind(limit)
        .fetch_all(exec)
        .await?;
    rows.into_iter().map(Checkpoint::try_from).collect()
}

/// Keyset page of `finalize_queued` rows (reconciler scan).
pub async fn page_finalize_queued<'e, E: PgExecutor<'e>>(
    exec: E,
    last_id: i64,
    limit: i64,
) -> Result<Vec<Checkpoint>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM checkpoints \
         WHERE state = 'finalize_queued' AND id > $1 ORDER BY id LIMIT $2"
    );
    let rows = sqlx::query_as::<_, CheckpointRow>(&sql)
        .bind(last_id)
        .bind(limit)
        .fetch_all(exec)
        .await?;
    rows.into_iter().map(Checkpoint::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_rejects_unknown_state() {
        let row = CheckpointRow {
            id: 1,
            name: "job-1-1-aabbccdd".into(),
            runner_id: "r1".into(),
            job_id: "1".into(),
            state: "limbo".into(),
            finalize_status: None,
            finalize_source: None,
            created_at: Utc::now(),
            finalized_at: None,
        };
        assert!(matches!(
            Checkpoint::try_from(row),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn row_conversion_maps_typed_fields() {
        let row = CheckpointRow {
            id: 7,
            name: "job-9-1-aabbccdd".into(),
            runner_id: "r1".into(),
            job_id: "9".into(),
            state: "finalize_queued".into(),
            finalize_status: Some("failure".into()),
            finalize_source: Some("webhook".into()),
            created_at: Utc::now(),
            finalized_at: Some(Utc::now()),
        };
        let cp = Checkpoint::try_from(row).unwrap();
        assert_eq!(cp.state, CheckpointState::FinalizeQueued);
        assert_eq!(cp.finalize_status, Some(FinalizeStatus::Failure));
        assert_eq!(cp.finalize_source.as_deref(), Some("webhook"));
    }
}
