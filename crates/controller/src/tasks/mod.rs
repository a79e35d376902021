// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous engine tasks: the finalize worker, the garbage
//! collector, the CI poller, and the reconciler, plus the loops that
//! drive them (queue worker, scheduler).

mod finalize;
mod gc;
mod poller;
mod reconcile;
mod scheduler;
mod worker;

use std::sync::Arc;

use ep_backends::{BackendError, BackendSet};
use ep_ci::{CiAdapter, CiError};
use ep_core::Settings;
use ep_store::{InventoryCache, StoreError};
use sqlx::PgPool;
use thiserror::Error;

pub(crate) use finalize::enqueue_or_log;
pub use finalize::{run_finalize, FinalizeOutcome};
pub use gc::gc_stale_checkpoints;
pub use poller::poll_active_checkpoints;
pub use reconcile::{reconcile_on_startup, reconcile_stuck_checkpoints};
pub use scheduler::run_scheduler;
pub use worker::run_worker;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("CI error: {0}")]
    Ci(#[from] CiError),

    #[error("{0}")]
    Fatal(String),

    #[error("task exceeded its hard time limit")]
    HardTimeout,
}

/// Everything a worker or scheduler process needs.
#[derive(Clone)]
pub struct WorkerCtx {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub inventory: Arc<InventoryCache>,
    pub backends: Arc<BackendSet>,
    /// Absent when no CI provider is configured; pause/unpause and the
    /// poller are disabled in that case.
    pub ci: Option<Arc<dyn CiAdapter>>,
}

impl WorkerCtx {
    /// Standard worker wiring: HTTP agent RPC against the controller's
    /// internal API, CI adapter from settings when configured.
    pub fn new(settings: Settings) -> Result<Self, StoreError> {
        let pool = ep_store::connect(&settings)?;
        let inventory = Arc::new(InventoryCache::new(
            pool.clone(),
            Some(settings.inventory_path.clone()),
        ));
        let rpc = Arc::new(ep_backends::HttpAgentRpc::new(
            settings.api_base_url.clone(),
            std::time::Duration::from_secs(settings.readiness_poll_interval_seconds),
        ));
        let backends = Arc::new(BackendSet::new(rpc, &settings));
        let ci = match ep_ci::build_adapter(&settings) {
            Ok(ci) => Some(ci),
            Err(e) => {
                tracing::warn!(error = %e, "CI adapter unavailable, pause/unpause and poller disabled");
                None
            }
        };
        Ok(Self {
            pool,
            settings: Arc::new(settings),
            inventory,
            backends,
            ci,
        })
    }
}
