// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inventory view: runner lookup by id.
//!
//! Backed by the active rows in the store with a short TTL cache. When
//! the database is unreachable the last good snapshot is served; with no
//! snapshot the YAML inventory file is the last resort.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ep_core::RunnerConfig;
use parking_lot::Mutex;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::runners;

const INVENTORY_TTL: Duration = Duration::from_secs(5);

/// Immutable snapshot of the runner fleet.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    runners: HashMap<String, RunnerConfig>,
}

impl Inventory {
    pub fn new(runners: HashMap<String, RunnerConfig>) -> Self {
        Self { runners }
    }

    pub fn get_runner(&self, runner_id: &str) -> Option<&RunnerConfig> {
        self.runners.get(runner_id)
    }

    pub fn runner_ids(&self) -> Vec<&str> {
        self.runners.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    runners: Vec<RunnerConfig>,
}

/// Parse and validate a YAML inventory file.
pub fn load_inventory_file(path: impl AsRef<Path>) -> Result<Inventory, StoreError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StoreError::Inventory(format!("cannot read {}: {e}", path.display()))
    })?;
    let file: InventoryFile = serde_yaml::from_str(&raw)
        .map_err(|e| StoreError::Inventory(format!("invalid inventory YAML: {e}")))?;

    let mut runners = HashMap::new();
    for runner in file.runners {
        runner.validate().map_err(StoreError::Inventory)?;
        runners.insert(runner.runner_id.clone(), runner);
    }
    Ok(Inventory::new(runners))
}

/// TTL-cached inventory with stale-on-failure fallback.
pub struct InventoryCache {
    pool: PgPool,
    yaml_path: Option<String>,
    cached: Mutex<Option<(Arc<Inventory>, Instant)>>,
}

impl InventoryCache {
    pub fn new(pool: PgPool, yaml_path: Option<String>) -> Self {
        Self {
            pool,
            yaml_path,
            cached: Mutex::new(None),
        }
    }

    /// Current inventory, refreshed from the store when the cache is
    /// older than the TTL.
    pub async fn get(&self) -> Result<Arc<Inventory>, StoreError> {
        if let Some((inv, at)) = self.cached.lock().clone() {
            if at.elapsed() < INVENTORY_TTL {
                return Ok(inv);
            }
        }

        match self.load_from_db().await {
            Ok(inv) => {
                let inv = Arc::new(inv);
                *self.cached.lock() = Some((Arc::clone(&inv), Instant::now()));
                Ok(inv)
            }
            Err(db_err) => {
                if let Some((stale, _)) = self.cached.lock().clone() {
                    tracing::warn!(error = %db_err, "store unavailable, using stale inventory cache");
                    return Ok(stale);
                }
                let Some(path) = &self.yaml_path else {
                    return Err(db_err);
                };
                tracing::warn!(
                    error = %db_err,
                    path = %path,
                    "store unavailable and no cache, falling back to YAML inventory"
                );
                let inv = Arc::new(load_inventory_file(path)?);
                *self.cached.lock() = Some((Arc::clone(&inv), Instant::now()));
                Ok(inv)
            }
        }
    }

    /// Drop the snapshot so the next `get` reloads (admin mutations).
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    async fn load_from_db(&self) -> Result<Inventory, StoreError> {
        let records = runners::list(&self.pool, false).await?;
        let mut map = HashMap::new();
        for record in records {
            map.insert(record.config.runner_id.clone(), record.config);
        }
        Ok(Inventory::new(map))
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
