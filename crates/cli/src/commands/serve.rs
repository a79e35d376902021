// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running processes: controller, finalize worker, scheduler.

use ep_controller::{run_scheduler, run_worker, WorkerCtx};
use ep_core::Settings;
use tokio_util::sync::CancellationToken;

use super::agent::spawn_signal_handler;
use crate::exit_error::ExitError;

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());
    token
}

pub async fn controller() -> Result<(), ExitError> {
    let settings = Settings::from_env();
    ep_controller::serve(settings, shutdown_token())
        .await
        .map_err(|e| ExitError::operation(e.to_string()))
}

pub async fn worker() -> Result<(), ExitError> {
    let settings = Settings::from_env();
    let ctx = WorkerCtx::new(settings).map_err(|e| ExitError::operation(e.to_string()))?;
    ep_store::migrate(&ctx.pool)
        .await
        .map_err(|e| ExitError::operation(e.to_string()))?;
    run_worker(ctx, shutdown_token())
        .await
        .map_err(|e| ExitError::operation(e.to_string()))
}

pub async fn scheduler() -> Result<(), ExitError> {
    let settings = Settings::from_env();
    let ctx = WorkerCtx::new(settings).map_err(|e| ExitError::operation(e.to_string()))?;
    ep_store::migrate(&ctx.pool)
        .await
        .map_err(|e| ExitError::operation(e.to_string()))?;
    run_scheduler(ctx, shutdown_token())
        .await
        .map_err(|e| ExitError::operation(e.to_string()))
}
