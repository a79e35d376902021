// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxmox VE backend.
//!
//! Checkpoints are real VM snapshots. Reset is the full sequence:
//! stop → wait stopped → rollback → wait task → start → wait running →
//! wait for the agent to reconnect → optional cleanup command → delete
//! the snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ep_core::{RunnerConfig, Settings};
use serde_json::json;

use crate::{AgentRpc, Backend, BackendError};

const STOP_TIMEOUT: Duration = Duration::from_secs(60);
const START_TIMEOUT: Duration = Duration::from_secs(180);
const TASK_TIMEOUT: Duration = Duration::from_secs(120);
const CMD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ProxmoxBackend {
    rpc: Arc<dyn AgentRpc>,
    client: reqwest::Client,
    poll_interval: Duration,
    readiness_timeout: Duration,
}

/// Required connection fields, extracted once per call.
struct VmRef<'a> {
    base: String,
    auth: String,
    node: &'a str,
    vmid: i64,
}

impl<'a> VmRef<'a> {
    fn qemu(&self, tail: &str) -> String {
        format!(
            "{}/api2/json/nodes/{}/qemu/{}{tail}",
            self.base, self.node, self.vmid
        )
    }

    fn task(&self, upid: &str) -> String {
        format!("{}/api2/json/nodes/{}/tasks/{upid}/status", self.base, self.node)
    }
}

impl ProxmoxBackend {
    pub fn new(rpc: Arc<dyn AgentRpc>, settings: &Settings) -> Self {
        Self {
            rpc,
            client: reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .timeout(Duration::from_secs(settings.http_timeout_seconds))
                .build()
                .unwrap_or_default(),
            poll_interval: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(settings.readiness_timeout_seconds),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn vm_ref<'a>(&self, runner: &'a RunnerConfig) -> Result<VmRef<'a>, BackendError> {
        let field = |name: &str, value: Option<&'a str>| {
            value.ok_or_else(|| BackendError::Misconfigured {
                runner_id: runner.runner_id.clone(),
                field: name.to_string(),
            })
        };
        let host = field("proxmox_host", runner.proxmox_host.as_deref())?;
        let user = field("proxmox_user", runner.proxmox_user.as_deref())?;
        let token_name = field("proxmox_token_name", runner.proxmox_token_name.as_deref())?;
        let token_value = field("proxmox_token_value", runner.proxmox_token_value.as_deref())?;
        let node = field("proxmox_node", runner.proxmox_node.as_deref())?;
        let vmid = runner
            .proxmox_vmid
            .ok_or_else(|| BackendError::Misconfigured {
                runner_id: runner.runner_id.clone(),
                field: "proxmox_vmid".to_string(),
            })?;

        // Hosts normally come as bare names; a full URL is honored as-is.
        let base = if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{host}:8006")
        };

        Ok(VmRef {
            base,
            auth: format!("PVEAPIToken={user}!{token_name}={token_value}"),
            node,
            vmid,
        })
    }

    async fn api_post(
        &self,
        vm: &VmRef<'_>,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, BackendError> {
        let mut req = self.client.post(url).header("Authorization", &vm.auth);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.map_err(map_transport)?;
        check_status(url, resp).await
    }

    async fn api_get(&self, vm: &VmRef<'_>, url: &str) -> Result<serde_json::Value, BackendError> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", &vm.auth)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(url, resp).await
    }

    async fn api_delete(&self, vm: &VmRef<'_>, url: &str) -> Result<serde_json::Value, BackendError> {
        let resp = self
            .client
            .delete(url)
            .header("Authorization", &vm.auth)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(url, resp).await
    }

    /// Poll `status/current` until the VM reports `target`.
    async fn wait_for_vm_status(
        &self,
        vm: &VmRef<'_>,
        target: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let url = vm.qemu("/status/current");
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let body = self.api_get(vm, &url).await?;
            let status = body
                .pointer("/data/status")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if status == target {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BackendError::Timeout(format!(
                    "VM {} did not reach '{target}' within {}s",
                    vm.vmid,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll a Proxmox task UPID until it stops; non-OK exit is an error.
    async fn wait_for_task(&self, vm: &VmRef<'_>, upid: &str) -> Result<(), BackendError> {
        let url = vm.task(upid);
        let deadline = tokio::time::Instant::now() + TASK_TIMEOUT;
        loop {
            let body = self.api_get(vm, &url).await?;
            let status = body
                .pointer("/data/status")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if status == "stopped" {
                let exit = body
                    .pointer("/data/exitstatus")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if exit != "OK" {
                    return Err(BackendError::Api(format!("Proxmox task failed: {exit}")));
                }
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BackendError::Timeout(format!(
                    "Proxmox task did not complete within {}s",
                    TASK_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn map_transport(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Api(e.to_string())
    }
}

async fn check_status(url: &str, resp: reqwest::Response) -> Result<serde_json::Value, BackendError> {
    let code = resp.status();
    if !code.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(BackendError::Api(format!("{url} failed with HTTP {code}: {text}")));
    }
    resp.json()
        .await
        .map_err(|e| BackendError::Api(format!("invalid response from {url}: {e}")))
}

#[async_trait]
impl Backend for ProxmoxBackend {
    async fn create_checkpoint(
        &self,
        runner: &RunnerConfig,
        name: &str,
    ) -> Result<(), BackendError> {
        let vm = self.vm_ref(runner)?;
        self.api_post(
            &vm,
            &vm.qemu("/snapshot"),
            Some(json!({
                "snapname": name,
                "description": format!("e2epool checkpoint {name}"),
            })),
        )
        .await?;
        Ok(())
    }

    async fn reset(&self, runner: &RunnerConfig, name: &str) -> Result<(), BackendError> {
        let vm = self.vm_ref(runner)?;

        self.api_post(&vm, &vm.qemu("/status/stop"), None).await?;
        self.wait_for_vm_status(&vm, "stopped", STOP_TIMEOUT).await?;

        let rollback = self
            .api_post(&vm, &vm.qemu(&format!("/snapshot/{name}/rollback")), None)
            .await?;
        if let Some(upid) = rollback.get("data").and_then(|v| v.as_str()) {
            self.wait_for_task(&vm, upid).await?;
        }

        self.api_post(&vm, &vm.qemu("/status/start"), None).await?;
        self.wait_for_vm_status(&vm, "running", START_TIMEOUT).await?;

        // The guest rebooted; its agent has to come back before any
        // cleanup command can run.
        self.rpc
            .wait_for_agent(&runner.runner_id, self.readiness_timeout)
            .await?;

        if let Some(cmd) = runner.cleanup_cmd.as_deref().filter(|c| !c.is_empty()) {
            self.rpc.exec(&runner.runner_id, cmd, CMD_TIMEOUT).await?;
        }

        self.api_delete(&vm, &vm.qemu(&format!("/snapshot/{name}")))
            .await?;
        Ok(())
    }

    async fn cleanup(&self, runner: &RunnerConfig, name: &str) -> Result<(), BackendError> {
        let vm = self.vm_ref(runner)?;
        if let Some(cmd) = runner.cleanup_cmd.as_deref().filter(|c| !c.is_empty()) {
            self.rpc.exec(&runner.runner_id, cmd, CMD_TIMEOUT).await?;
        }
        self.api_delete(&vm, &vm.qemu(&format!("/snapshot/{name}")))
            .await?;
        Ok(())
    }

    async fn check_ready(&self, runner: &RunnerConfig) -> Result<bool, BackendError> {
        self.rpc
            .wait_for_agent(&runner.runner_id, self.readiness_timeout)
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "proxmox_tests.rs"]
mod tests;
