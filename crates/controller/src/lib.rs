// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ep-controller: the checkpoint lifecycle engine.
//!
//! HTTP/WebSocket surface, the agent session manager, the checkpoint
//! service, and the asynchronous machinery around it: finalize worker,
//! garbage collector, CI poller, webhook ingestion, and the reconciler.

pub mod app;
pub mod auth;
pub mod channel_rpc;
pub mod dto;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;
pub mod tasks;
pub mod ws_handler;

pub use app::{build_router, serve, ServeError};
pub use session::{ChannelError, SessionManager};
pub use state::AppState;
pub use tasks::{run_scheduler, run_worker, WorkerCtx};
