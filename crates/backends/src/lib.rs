// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ep-backends: snapshot/reset/cleanup/readiness against a runner.
//!
//! Two variants: Proxmox VMs (real snapshots over the Proxmox REST API)
//! and bare metal (operator-supplied commands run through the agent).
//! Backends never talk to agents directly; they go through [`AgentRpc`],
//! which the controller implements in-process and workers implement over
//! the internal HTTP API.

mod agent_rpc;
mod bare_metal;
mod proxmox;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ep_core::{RunnerBackend, RunnerConfig, Settings};
use thiserror::Error;

pub use agent_rpc::{AgentRpc, HttpAgentRpc};
pub use bare_metal::BareMetalBackend;
pub use proxmox::ProxmoxBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Api(String),

    #[error("agent for runner '{0}' is not connected")]
    AgentNotConnected(String),

    #[error("agent command failed: {0}")]
    Agent(String),

    #[error("runner '{runner_id}' is missing '{field}'")]
    Misconfigured { runner_id: String, field: String },
}

/// Capability set of a runner backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Produce a point-in-time snapshot named `name`.
    async fn create_checkpoint(&self, runner: &RunnerConfig, name: &str)
        -> Result<(), BackendError>;

    /// Restore the runner to the snapshot `name`.
    async fn reset(&self, runner: &RunnerConfig, name: &str) -> Result<(), BackendError>;

    /// Success-path disposal of the snapshot without a rollback.
    async fn cleanup(&self, runner: &RunnerConfig, name: &str) -> Result<(), BackendError>;

    /// Whether the runner is ready to take traffic again.
    async fn check_ready(&self, runner: &RunnerConfig) -> Result<bool, BackendError>;
}

/// Registry of backend implementations keyed by runner backend kind.
pub struct BackendSet {
    backends: HashMap<RunnerBackend, Arc<dyn Backend>>,
}

impl BackendSet {
    /// Standard registry wired to the given agent RPC.
    pub fn new(rpc: Arc<dyn AgentRpc>, settings: &Settings) -> Self {
        let mut backends: HashMap<RunnerBackend, Arc<dyn Backend>> = HashMap::new();
        backends.insert(
            RunnerBackend::Proxmox,
            Arc::new(ProxmoxBackend::new(Arc::clone(&rpc), settings)),
        );
        backends.insert(
            RunnerBackend::BareMetal,
            Arc::new(BareMetalBackend::new(rpc)),
        );
        Self { backends }
    }

    /// Registry with explicit entries (tests and future variants).
    pub fn with_backends(backends: HashMap<RunnerBackend, Arc<dyn Backend>>) -> Self {
        Self { backends }
    }

    pub fn for_runner(&self, runner: &RunnerConfig) -> Option<Arc<dyn Backend>> {
        self.backends.get(&runner.backend).map(Arc::clone)
    }
}
