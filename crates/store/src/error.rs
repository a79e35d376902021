// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("active checkpoint already exists for runner '{runner_id}'")]
    DuplicateActive { runner_id: String },

    #[error("checkpoint '{name}' already exists")]
    DuplicateName { name: String },

    #[error("runner '{runner_id}' already registered")]
    DuplicateRunner { runner_id: String },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("inventory error: {0}")]
    Inventory(String),
}

/// True when `err` is a unique-constraint violation on `constraint`.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}
