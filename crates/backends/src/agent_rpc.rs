// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent RPC seam.
//!
//! `IsConnected` and `WaitForAgent` (plus exec) are the only primitives
//! backends use to reach agents. Worker processes implement them against
//! the controller's internal HTTP API; the controller itself binds them
//! straight to its session manager.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::BackendError;

#[async_trait]
pub trait AgentRpc: Send + Sync {
    /// Execute a shell command on the runner's agent; returns stdout.
    async fn exec(&self, runner_id: &str, cmd: &str, timeout: Duration)
        -> Result<String, BackendError>;

    /// Whether the agent currently holds a live channel.
    async fn is_connected(&self, runner_id: &str) -> Result<bool, BackendError>;

    /// Poll until the agent is connected or the deadline passes.
    async fn wait_for_agent(&self, runner_id: &str, timeout: Duration)
        -> Result<(), BackendError>;
}

/// HTTP client for the controller's `/internal/agent` endpoints.
pub struct HttpAgentRpc {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl HttpAgentRpc {
    pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            poll_interval,
        }
    }
}

#[async_trait]
impl AgentRpc for HttpAgentRpc {
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let url = format!("{}/internal/agent/{runner_id}/exec", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "cmd": cmd, "timeout": timeout.as_secs_f64() }))
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(format!("exec request to agent {runner_id} timed out"))
                } else {
                    BackendError::Api(e.to_string())
                }
            })?;

        match resp.status().as_u16() {
            200 => {
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| BackendError::Api(format!("invalid exec response: {e}")))?;
                Ok(body
                    .get("stdout")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string())
            }
            503 => Err(BackendError::AgentNotConnected(runner_id.to_string())),
            504 => Err(BackendError::Timeout(format!(
                "agent {runner_id} command timed out"
            ))),
            code => {
                let detail = resp.text().await.unwrap_or_default();
                Err(BackendError::Agent(format!(
                    "agent {runner_id} command failed (HTTP {code}): {detail}"
                )))
            }
        }
    }

    async fn is_connected(&self, runner_id: &str) -> Result<bool, BackendError> {
        let url = format!("{}/internal/agent/{runner_id}/connected", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| BackendError::Api(e.to_string()))?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("invalid connected response: {e}")))?;
        Ok(body
            .get("connected")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn wait_for_agent(
        &self,
        runner_id: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_connected(runner_id).await.unwrap_or(false) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BackendError::Timeout(format!(
                    "agent {runner_id} not connected after {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
