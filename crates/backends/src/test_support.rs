// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording fake for the agent RPC seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{AgentRpc, BackendError};

#[derive(Default)]
pub struct FakeAgentRpc {
    pub connected: Mutex<bool>,
    pub exec_fails: Mutex<bool>,
    pub exec_calls: Mutex<Vec<(String, String)>>,
    pub wait_calls: Mutex<Vec<String>>,
}

impl FakeAgentRpc {
    pub fn connected() -> Arc<Self> {
        let rpc = Self::default();
        *rpc.connected.lock() = true;
        Arc::new(rpc)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<String> {
        self.exec_calls.lock().iter().map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait]
impl AgentRpc for FakeAgentRpc {
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<String, BackendError> {
        self.exec_calls
            .lock()
            .push((runner_id.to_string(), cmd.to_string()));
        if *self.exec_fails.lock() {
            return Err(BackendError::Agent("command failed (exit 1)".into()));
        }
        Ok("ok\n".to_string())
    }

    async fn is_connected(&self, _runner_id: &str) -> Result<bool, BackendError> {
        Ok(*self.connected.lock())
    }

    async fn wait_for_agent(
        &self,
        runner_id: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        self.wait_calls.lock().push(runner_id.to_string());
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(BackendError::Timeout(format!(
                "agent {runner_id} not connected after {}s",
                timeout.as_secs()
            )))
        }
    }
}
