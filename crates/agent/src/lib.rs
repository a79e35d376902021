// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ep-agent: the per-runner agent daemon.
//!
//! Holds a persistent WebSocket channel to the controller (executing
//! `exec` requests from it) and a local IPC socket the CLI companion
//! uses; CLI requests are proxied over the channel.

pub mod config;
pub mod daemon;
pub mod exec;
pub mod ipc;

use thiserror::Error;

pub use config::{load_agent_config, AgentConfig};
pub use daemon::Agent;
pub use exec::run_exec;
pub use ipc::{IpcClient, IpcServer};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ep_wire::ProtocolError),

    #[error("not connected to controller")]
    NotConnected,

    #[error("controller did not respond in time")]
    ResponseTimeout,

    #[error("connection lost")]
    ConnectionLost,
}
