// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn missing_file_yields_defaults() {
    let config = load_agent_config(Some("/nonexistent/agent.yml")).unwrap();
    assert_eq!(config, AgentConfig::default());
    assert_eq!(config.reconnect_max_delay, 60);
    assert_eq!(config.heartbeat_interval, 30);
}

#[test]
#[serial]
fn file_values_override_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        b"controller_url: wss://ctrl.example/ws/agent\nrunner_id: r1\ntoken: t1\nreconnect_max_delay: 15\n",
    )
    .unwrap();

    let config = load_agent_config(file.path().to_str()).unwrap();
    assert_eq!(config.controller_url, "wss://ctrl.example/ws/agent");
    assert_eq!(config.runner_id, "r1");
    assert_eq!(config.token, "t1");
    assert_eq!(config.reconnect_max_delay, 15);
    // Unspecified keys keep their defaults.
    assert_eq!(config.socket_path, "/var/run/e2epool-agent.sock");
}

#[test]
#[serial]
fn env_overrides_beat_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"runner_id: from-file\n").unwrap();

    std::env::set_var("E2EPOOL_RUNNER_ID", "from-env");
    std::env::set_var("E2EPOOL_HEARTBEAT_INTERVAL", "7");
    let config = load_agent_config(file.path().to_str()).unwrap();
    std::env::remove_var("E2EPOOL_RUNNER_ID");
    std::env::remove_var("E2EPOOL_HEARTBEAT_INTERVAL");

    assert_eq!(config.runner_id, "from-env");
    assert_eq!(config.heartbeat_interval, 7);
}

#[test]
#[serial]
fn invalid_yaml_is_a_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"runner_id: [unclosed\n").unwrap();
    assert!(load_agent_config(file.path().to_str()).is_err());
}
