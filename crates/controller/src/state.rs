// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared controller state.

use std::sync::Arc;

use ep_backends::BackendSet;
use ep_core::Settings;
use ep_store::{InventoryCache, StoreError};
use sqlx::PgPool;

use crate::channel_rpc::ChannelAgentRpc;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub inventory: Arc<InventoryCache>,
    pub backends: Arc<BackendSet>,
}

impl AppState {
    /// Wire up the controller: lazy pool, in-process agent RPC, backend
    /// registry, and the TTL inventory cache.
    pub fn new(settings: Settings) -> Result<Self, StoreError> {
        let pool = ep_store::connect(&settings)?;
        let sessions = Arc::new(SessionManager::new());
        let inventory = Arc::new(InventoryCache::new(
            pool.clone(),
            Some(settings.inventory_path.clone()),
        ));
        let rpc = Arc::new(ChannelAgentRpc::new(Arc::clone(&sessions), &settings));
        let backends = Arc::new(BackendSet::new(rpc, &settings));
        Ok(Self {
            pool,
            settings: Arc::new(settings),
            sessions,
            inventory,
            backends,
        })
    }
}
