// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`AgentRpc`]: binds backend agent calls straight to the
//! session manager. Worker processes use the HTTP variant instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ep_backends::{AgentRpc, BackendError};
use ep_core::Settings;
use serde_json::json;

use crate::session::{ChannelError, SessionManager};

pub struct ChannelAgentRpc {
    sessions: Arc<SessionManager>,
    poll_interval: Duration,
}

impl ChannelAgentRpc {
    pub fn new(sessions: Arc<SessionManager>, settings: &Settings) -> Self {
        Self {
            sessions,
            poll_interval: Duration::from_secs(settings.readiness_poll_interval_seconds),
        }
    }
}

fn map_channel_error(e: ChannelError) -> BackendError {
    match e {
        ChannelError::NotConnected(id) | ChannelError::Disconnected(id) => {
            BackendError::AgentNotConnected(id)
        }
        ChannelError::Timeout { runner_id, timeout_secs } => BackendError::Timeout(format!(
            "agent {runner_id} did not respond within {timeout_secs}s"
        )),
    }
}

#[async_trait]
impl AgentRpc for ChannelAgentRpc {
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let response = self
            .sessions
            .send_command(
                runner_id,
                json!({ "cmd": cmd, "timeout": timeout.as_secs_f64() }),
                timeout + Duration::from_secs(5),
            )
            .await
            .map_err(map_channel_error)?;

        let is_ok = response.is_ok();
        let data = response.data.unwrap_or_default();
        if !is_ok {
            let exit_code = data.get("exit_code").and_then(|v| v.as_i64()).unwrap_or(-1);
            let stderr = data.get("stderr").and_then(|v| v.as_str()).unwrap_or("");
            return Err(BackendError::Agent(format!(
                "command failed (exit {exit_code}): {stderr}"
            )));
        }
        Ok(data
            .get("stdout")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn is_connected(&self, runner_id: &str) -> Result<bool, BackendError> {
        Ok(self.sessions.is_connected(runner_id))
    }

    async fn wait_for_agent(
        &self,
        runner_id: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        if self
            .sessions
            .wait_for_agent(runner_id, timeout, self.poll_interval)
            .await
        {
            Ok(())
        } else {
            Err(BackendError::Timeout(format!(
                "agent {runner_id} not connected after {}s",
                timeout.as_secs()
            )))
        }
    }
}
