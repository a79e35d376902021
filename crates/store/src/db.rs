// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool construction and schema migration.

use std::time::Duration;

use ep_core::Settings;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::StoreError;

/// Connect a pool sized from settings. The pool is lazy: connections are
/// established on first use, so startup does not require a reachable
/// database (health checks report the truth).
pub fn connect(settings: &Settings) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.db_pool_size)
        .acquire_timeout(Duration::from_secs(30))
        .connect_lazy(&settings.database_url)?;
    Ok(pool)
}

/// Run embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Connectivity probe used by `/healthz`.
pub async fn health_check(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
