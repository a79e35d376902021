// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool agent` — run the agent daemon in the foreground.

use ep_agent::{load_agent_config, Agent};
use tokio_util::sync::CancellationToken;

use crate::exit_error::ExitError;

pub async fn run(config_path: Option<&str>) -> Result<(), ExitError> {
    let config = load_agent_config(config_path).map_err(|e| ExitError::operation(e.to_string()))?;
    if config.runner_id.is_empty() || config.token.is_empty() {
        return Err(ExitError::operation(
            "runner_id and token must be configured",
        ));
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    Agent::new(config)
        .run(shutdown)
        .await
        .map_err(|e| ExitError::operation(e.to_string()))
}

/// Cancel on SIGINT or SIGTERM.
pub(crate) fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM");
                    let _ = ctrl_c.await;
                    shutdown.cancel();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });
}
