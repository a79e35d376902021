// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: YAML file overridden by environment variables.

use std::path::Path;

use serde::Deserialize;

use crate::AgentError;

const DEFAULT_CONFIG_PATH: &str = "/etc/e2epool/agent.yml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub controller_url: String,
    pub runner_id: String,
    pub token: String,
    pub socket_path: String,
    pub reconnect_max_delay: u64,
    pub heartbeat_interval: u64,
    /// Seconds the agent waits for the controller to answer a proxied
    /// CLI request.
    pub request_timeout: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controller_url: "ws://localhost:8080/ws/agent".into(),
            runner_id: String::new(),
            token: String::new(),
            socket_path: "/var/run/e2epool-agent.sock".into(),
            reconnect_max_delay: 60,
            heartbeat_interval: 30,
            request_timeout: 30,
        }
    }
}

/// Load config from a YAML file (explicit path, `E2EPOOL_AGENT_CONFIG`,
/// or the default location), then apply env overrides. A missing file is
/// fine; defaults plus environment carry a minimal install.
pub fn load_agent_config(path: Option<&str>) -> Result<AgentConfig, AgentError> {
    let path = path
        .map(str::to_string)
        .or_else(|| std::env::var("E2EPOOL_AGENT_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| AgentError::Config(format!("cannot read {path}: {e}")))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| AgentError::Config(format!("invalid config {path}: {e}")))?
    } else {
        AgentConfig::default()
    };

    if let Ok(v) = std::env::var("E2EPOOL_CONTROLLER_URL") {
        config.controller_url = v;
    }
    if let Ok(v) = std::env::var("E2EPOOL_RUNNER_ID") {
        config.runner_id = v;
    }
    if let Ok(v) = std::env::var("E2EPOOL_TOKEN") {
        config.token = v;
    }
    if let Ok(v) = std::env::var("E2EPOOL_SOCKET_PATH") {
        config.socket_path = v;
    }
    if let Ok(v) = std::env::var("E2EPOOL_RECONNECT_MAX_DELAY") {
        if let Ok(v) = v.parse() {
            config.reconnect_max_delay = v;
        }
    }
    if let Ok(v) = std::env::var("E2EPOOL_HEARTBEAT_INTERVAL") {
        if let Ok(v) = v.parse() {
            config.heartbeat_interval = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
