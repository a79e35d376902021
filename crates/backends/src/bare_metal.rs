// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bare-metal backend.
//!
//! No snapshot capability: create is a no-op and reset/cleanup run the
//! operator-supplied commands through the agent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ep_core::RunnerConfig;

use crate::{AgentRpc, Backend, BackendError};

const CMD_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BareMetalBackend {
    rpc: Arc<dyn AgentRpc>,
}

impl BareMetalBackend {
    pub fn new(rpc: Arc<dyn AgentRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Backend for BareMetalBackend {
    async fn create_checkpoint(
        &self,
        _runner: &RunnerConfig,
        _name: &str,
    ) -> Result<(), BackendError> {
        // No snapshot capability on bare metal.
        Ok(())
    }

    async fn reset(&self, runner: &RunnerConfig, _name: &str) -> Result<(), BackendError> {
        if let Some(cmd) = runner.reset_cmd.as_deref().filter(|c| !c.is_empty()) {
            self.rpc.exec(&runner.runner_id, cmd, CMD_TIMEOUT).await?;
        }
        Ok(())
    }

    async fn cleanup(&self, runner: &RunnerConfig, _name: &str) -> Result<(), BackendError> {
        if let Some(cmd) = runner.cleanup_cmd.as_deref().filter(|c| !c.is_empty()) {
            self.rpc.exec(&runner.runner_id, cmd, CMD_TIMEOUT).await?;
        }
        Ok(())
    }

    async fn check_ready(&self, runner: &RunnerConfig) -> Result<bool, BackendError> {
        if let Some(cmd) = runner.readiness_cmd.as_deref().filter(|c| !c.is_empty()) {
            return match self.rpc.exec(&runner.runner_id, cmd, CMD_TIMEOUT).await {
                Ok(_) => Ok(true),
                Err(e) => {
                    tracing::debug!(runner_id = %runner.runner_id, error = %e, "readiness command failed");
                    Ok(false)
                }
            };
        }

        // No readiness command: probe agent connectivity.
        match self
            .rpc
            .wait_for_agent(&runner.runner_id, PROBE_TIMEOUT)
            .await
        {
            Ok(()) => Ok(true),
            Err(BackendError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "bare_metal_tests.rs"]
mod tests;
