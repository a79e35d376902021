// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry repository.
//!
//! Tokens authenticate both the HTTP bearer scheme and the agent channel.
//! Deleting a runner is a soft-delete (`is_active = false`); re-creating
//! it reactivates the row with a fresh token.

use chrono::{DateTime, Utc};
use ep_core::{RunnerBackend, RunnerConfig};
use rand::RngCore;
use sqlx::PgExecutor;

use crate::error::{is_unique_violation, StoreError};

const COLUMNS: &str = "id, runner_id, backend, token, proxmox_host, proxmox_user, \
    proxmox_token_name, proxmox_token_value, proxmox_node, proxmox_vmid, \
    reset_cmd, cleanup_cmd, readiness_cmd, ci_runner_id, tags, is_active, \
    created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct RunnerRow {
    id: i64,
    runner_id: String,
    backend: String,
    token: String,
    proxmox_host: Option<String>,
    proxmox_user: Option<String>,
    proxmox_token_name: Option<String>,
    proxmox_token_value: Option<String>,
    proxmox_node: Option<String>,
    proxmox_vmid: Option<i64>,
    reset_cmd: Option<String>,
    cleanup_cmd: Option<String>,
    readiness_cmd: Option<String>,
    ci_runner_id: Option<i64>,
    tags: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A full registry row: the engine-facing config plus admin metadata.
#[derive(Debug, Clone)]
pub struct RunnerRecord {
    pub id: i64,
    pub config: RunnerConfig,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RunnerRow> for RunnerRecord {
    type Error = StoreError;

    fn try_from(row: RunnerRow) -> Result<Self, StoreError> {
        let backend = RunnerBackend::parse(&row.backend)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown backend '{}'", row.backend)))?;
        let tags = match &row.tags {
            None => Vec::new(),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| StoreError::Corrupt(format!("bad tags JSON: {e}")))?,
        };
        Ok(RunnerRecord {
            id: row.id,
            config: RunnerConfig {
                runner_id: row.runner_id,
                backend,
                token: row.token,
                proxmox_host: row.proxmox_host,
                proxmox_user: row.proxmox_user,
                proxmox_token_name: row.proxmox_token_name,
                proxmox_token_value: row.proxmox_token_value,
                proxmox_node: row.proxmox_node,
                proxmox_vmid: row.proxmox_vmid,
                reset_cmd: row.reset_cmd,
                cleanup_cmd: row.cleanup_cmd,
                readiness_cmd: row.readiness_cmd,
                ci_runner_id: row.ci_runner_id,
                tags,
            },
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Server-side runner token: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn encode_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        serde_json::to_string(tags).ok()
    }
}

/// Resolve a bearer token to its active runner.
pub async fn find_by_token<'e, E: PgExecutor<'e>>(
    exec: E,
    token: &str,
) -> Result<Option<RunnerRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM runners WHERE token = $1 AND is_active");
    let row = sqlx::query_as::<_, RunnerRow>(&sql)
        .bind(token)
        .fetch_optional(exec)
        .await?;
    row.map(RunnerRecord::try_from).transpose()
}

/// Agent-channel authentication: the `(runner_id, token)` pair must match
/// exactly one active row.
pub async fn find_by_credentials<'e, E: PgExecutor<'e>>(
    exec: E,
    runner_id: &str,
    token: &str,
) -> Result<Option<RunnerRecord>, StoreError> {
    let sql =
        format!("SELECT {COLUMNS} FROM runners WHERE runner_id = $1 AND token = $2 AND is_active");
    let row = sqlx::query_as::<_, RunnerRow>(&sql)
        .bind(runner_id)
        .bind(token)
        .fetch_optional(exec)
        .await?;
    row.map(RunnerRecord::try_from).transpose()
}

pub async fn get_active<'e, E: PgExecutor<'e>>(
    exec: E,
    runner_id: &str,
) -> Result<Option<RunnerRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM runners WHERE runner_id = $1 AND is_active");
    let row = sqlx::query_as::<_, RunnerRow>(&sql)
        .bind(runner_id)
        .fetch_optional(exec)
        .await?;
    row.map(RunnerRecord::try_from).transpose()
}

pub async fn list<'e, E: PgExecutor<'e>>(
    exec: E,
    include_inactive: bool,
) -> Result<Vec<RunnerRecord>, StoreError> {
    let filter = if include_inactive { "" } else { " WHERE is_active" };
    let sql = format!("SELECT {COLUMNS} FROM runners{filter} ORDER BY runner_id");
    let rows = sqlx::query_as::<_, RunnerRow>(&sql).fetch_all(exec).await?;
    rows.into_iter().map(RunnerRecord::try_from).collect()
}

/// Insert a new runner or reactivate a deactivated one, always with a
/// fresh server-generated token. An existing active row is a conflict.
pub async fn create<'e, E: PgExecutor<'e> + Copy>(
    exec: E,
    config: &RunnerConfig,
) -> Result<RunnerRecord, StoreError> {
    config
        .validate()
        .map_err(StoreError::Inventory)?;
    let token = generate_token();

    let existing_inactive = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM runners WHERE runner_id = $1 AND NOT is_active",
    )
    .bind(&config.runner_id)
    .fetch_optional(exec)
    .await?;

    if let Some(id) = existing_inactive {
        let sql = format!(
            "UPDATE runners SET backend = $2, token = $3, proxmox_host = $4, proxmox_user = $5, \
             proxmox_token_name = $6, proxmox_token_value = $7, proxmox_node = $8, proxmox_vmid = $9, \
             reset_cmd = $10, cleanup_cmd = $11, readiness_cmd = $12, ci_runner_id = $13, tags = $14, \
             is_active = TRUE, updated_at = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = bind_fields(sqlx::query_as::<_, RunnerRow>(&sql).bind(id), config, &token)
            .fetch_one(exec)
            .await?;
        return row.try_into();
    }

    let sql = format!(
        "INSERT INTO runners (runner_id, backend, token, proxmox_host, proxmox_user, \
         proxmox_token_name, proxmox_token_value, proxmox_node, proxmox_vmid, \
         reset_cmd, cleanup_cmd, readiness_cmd, ci_runner_id, tags) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING {COLUMNS}"
    );
    let row = bind_fields(
        sqlx::query_as::<_, RunnerRow>(&sql).bind(&config.runner_id),
        config,
        &token,
    )
    .fetch_one(exec)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "ix_runners_runner_id") {
            StoreError::DuplicateRunner {
                runner_id: config.runner_id.clone(),
            }
        } else {
            StoreError::Database(e)
        }
    })?;
    row.try_into()
}

type RunnerQuery<'q> =
    sqlx::query::QueryAs<'q, sqlx::Postgres, RunnerRow, sqlx::postgres::PgArguments>;

fn bind_fields<'q>(
    query: RunnerQuery<'q>,
    config: &'q RunnerConfig,
    token: &'q str,
) -> RunnerQuery<'q> {
    query
        .bind(config.backend.as_str())
        .bind(token)
        .bind(&config.proxmox_host)
        .bind(&config.proxmox_user)
        .bind(&config.proxmox_token_name)
        .bind(&config.proxmox_token_value)
        .bind(&config.proxmox_node)
        .bind(config.proxmox_vmid)
        .bind(&config.reset_cmd)
        .bind(&config.cleanup_cmd)
        .bind(&config.readiness_cmd)
        .bind(config.ci_runner_id)
        .bind(encode_tags(&config.tags))
}

/// Soft-delete. Returns `false` when no active row matched.
pub async fn deactivate<'e, E: PgExecutor<'e>>(
    exec: E,
    runner_id: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE runners SET is_active = FALSE, updated_at = now() \
         WHERE runner_id = $1 AND is_active",
    )
    .bind(runner_id)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Inventory import: insert or update by `runner_id`, keeping the token
/// from the file (agents are provisioned with it out of band).
pub async fn upsert<'e, E: PgExecutor<'e>>(
    exec: E,
    config: &RunnerConfig,
) -> Result<RunnerRecord, StoreError> {
    config
        .validate()
        .map_err(StoreError::Inventory)?;
    if config.token.is_empty() {
        return Err(StoreError::Inventory(format!(
            "Runner '{}' has no token; imported runners must carry one",
            config.runner_id
        )));
    }

    let sql = format!(
        "INSERT INTO runners (runner_id, backend, token, proxmox_host, proxmox_user, \
         proxmox_token_name, proxmox_token_value, proxmox_node, proxmox_vmid, \
         reset_cmd, cleanup_cmd, readiness_cmd, ci_runner_id, tags) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (runner_id) DO UPDATE SET \
             backend = EXCLUDED.backend, token = EXCLUDED.token, \
             proxmox_host = EXCLUDED.proxmox_host, proxmox_user = EXCLUDED.proxmox_user, \
             proxmox_token_name = EXCLUDED.proxmox_token_name, \
             proxmox_token_value = EXCLUDED.proxmox_token_value, \
             proxmox_node = EXCLUDED.proxmox_node, proxmox_vmid = EXCLUDED.proxmox_vmid, \
             reset_cmd = EXCLUDED.reset_cmd, cleanup_cmd = EXCLUDED.cleanup_cmd, \
             readiness_cmd = EXCLUDED.readiness_cmd, ci_runner_id = EXCLUDED.ci_runner_id, \
             tags = EXCLUDED.tags, is_active = TRUE, updated_at = now() \
         RETURNING {COLUMNS}"
    );
    let row = bind_fields(
        sqlx::query_as::<_, RunnerRow>(&sql).bind(&config.runner_id),
        config,
        &config.token,
    )
    .fetch_one(exec)
    .await?;
    row.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn tags_encode_round_trips() {
        assert_eq!(encode_tags(&[]), None);
        let encoded = encode_tags(&["e2e".into(), "nightly".into()]).unwrap();
        let back: Vec<String> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back, vec!["e2e".to_string(), "nightly".to_string()]);
    }
}
