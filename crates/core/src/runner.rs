// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner configuration as consumed by the engine.
//!
//! The engine reads runners; it never mutates them. Rows live in the
//! store, the YAML inventory file is an import/bootstrap format with the
//! same shape.

use serde::{Deserialize, Serialize};

/// Which reset mechanism a runner uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerBackend {
    Proxmox,
    BareMetal,
}

impl RunnerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerBackend::Proxmox => "proxmox",
            RunnerBackend::BareMetal => "bare_metal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proxmox" => Some(RunnerBackend::Proxmox),
            "bare_metal" => Some(RunnerBackend::BareMetal),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunnerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One runner's provisioning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub runner_id: String,
    pub backend: RunnerBackend,
    #[serde(default)]
    pub token: String,

    // Proxmox-specific
    #[serde(default)]
    pub proxmox_host: Option<String>,
    #[serde(default)]
    pub proxmox_user: Option<String>,
    #[serde(default)]
    pub proxmox_token_name: Option<String>,
    #[serde(default)]
    pub proxmox_token_value: Option<String>,
    #[serde(default)]
    pub proxmox_node: Option<String>,
    #[serde(default)]
    pub proxmox_vmid: Option<i64>,

    // Bare-metal specific
    #[serde(default)]
    pub reset_cmd: Option<String>,
    #[serde(default)]
    pub cleanup_cmd: Option<String>,
    #[serde(default)]
    pub readiness_cmd: Option<String>,

    /// CI-side runner handle for pause/unpause; absent means the CI
    /// platform is never paused for this runner.
    #[serde(default)]
    pub ci_runner_id: Option<i64>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunnerConfig {
    pub fn new(runner_id: impl Into<String>, backend: RunnerBackend) -> Self {
        Self {
            runner_id: runner_id.into(),
            backend,
            token: String::new(),
            proxmox_host: None,
            proxmox_user: None,
            proxmox_token_name: None,
            proxmox_token_value: None,
            proxmox_node: None,
            proxmox_vmid: None,
            reset_cmd: None,
            cleanup_cmd: None,
            readiness_cmd: None,
            ci_runner_id: None,
            tags: Vec::new(),
        }
    }

    /// Validate backend-specific required fields.
    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            RunnerBackend::BareMetal => {
                if self.reset_cmd.as_deref().unwrap_or("").is_empty() {
                    return Err(format!(
                        "Runner '{}' with bare_metal backend requires 'reset_cmd'",
                        self.runner_id
                    ));
                }
            }
            RunnerBackend::Proxmox => {
                let mut missing = Vec::new();
                if self.proxmox_host.is_none() {
                    missing.push("proxmox_host");
                }
                if self.proxmox_user.is_none() {
                    missing.push("proxmox_user");
                }
                if self.proxmox_token_name.is_none() {
                    missing.push("proxmox_token_name");
                }
                if self.proxmox_token_value.is_none() {
                    missing.push("proxmox_token_value");
                }
                if self.proxmox_node.is_none() {
                    missing.push("proxmox_node");
                }
                if self.proxmox_vmid.is_none() {
                    missing.push("proxmox_vmid");
                }
                if !missing.is_empty() {
                    return Err(format!(
                        "Runner '{}' with proxmox backend is missing required fields: {}",
                        self.runner_id,
                        missing.join(", ")
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
