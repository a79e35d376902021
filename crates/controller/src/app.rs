// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly and the controller's serve loop.

use axum::routing::{get, post};
use axum::Router;
use ep_core::Settings;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::routes;
use crate::state::AppState;
use crate::tasks;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("store error: {0}")]
    Store(#[from] ep_store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("startup reconcile failed: {0}")]
    Reconcile(String),
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/checkpoint/create", post(routes::checkpoint::create))
        .route("/checkpoint/finalize", post(routes::checkpoint::finalize))
        .route(
            "/checkpoint/status/{checkpoint_name}",
            get(routes::checkpoint::status),
        )
        .route("/runner/readiness", get(routes::runner::readiness))
        .route("/ws/agent", get(routes::ws::ws_agent))
        .route(
            "/internal/agent/{runner_id}/exec",
            post(routes::internal::agent_exec),
        )
        .route(
            "/internal/agent/{runner_id}/connected",
            get(routes::internal::agent_connected),
        )
        .route("/webhooks/gitlab", post(routes::webhook::gitlab))
        .route("/webhooks/github", post(routes::webhook::github))
        .route(
            "/admin/runners",
            post(routes::admin::create_runner).get(routes::admin::list_runners),
        )
        .route(
            "/admin/runners/{runner_id}",
            get(routes::admin::get_runner).delete(routes::admin::delete_runner),
        )
        .with_state(state)
}

/// Run the controller: migrate, reconcile once, then serve until
/// `shutdown` fires.
pub async fn serve(settings: Settings, shutdown: CancellationToken) -> Result<(), ServeError> {
    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(settings)?;

    ep_store::migrate(&state.pool).await?;
    tasks::reconcile_on_startup(&state.pool, state.settings.query_batch_size)
        .await
        .map_err(|e| ServeError::Reconcile(e.to_string()))?;

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "controller listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
