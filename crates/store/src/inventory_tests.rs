// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ep_core::RunnerBackend;

use super::*;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_a_mixed_inventory() {
    let file = write_temp(
        r#"
runners:
  - runner_id: vm-alpha
    backend: proxmox
    token: tok-a
    proxmox_host: pve.example
    proxmox_user: root@pam
    proxmox_token_name: e2epool
    proxmox_token_value: secret
    proxmox_node: node1
    proxmox_vmid: 101
    ci_runner_id: 42
  - runner_id: bare-01
    backend: bare_metal
    token: tok-b
    reset_cmd: "reset.sh"
"#,
    );
    let inv = load_inventory_file(file.path()).unwrap();
    assert_eq!(inv.len(), 2);

    let vm = inv.get_runner("vm-alpha").unwrap();
    assert_eq!(vm.backend, RunnerBackend::Proxmox);
    assert_eq!(vm.ci_runner_id, Some(42));

    let bare = inv.get_runner("bare-01").unwrap();
    assert_eq!(bare.reset_cmd.as_deref(), Some("reset.sh"));
    assert!(inv.get_runner("missing").is_none());
}

#[test]
fn rejects_bare_metal_without_reset_cmd() {
    let file = write_temp(
        r#"
runners:
  - runner_id: bare-01
    backend: bare_metal
    token: tok-b
"#,
    );
    let err = load_inventory_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("reset_cmd"), "{err}");
}

#[test]
fn rejects_proxmox_with_missing_fields() {
    let file = write_temp(
        r#"
runners:
  - runner_id: vm-alpha
    backend: proxmox
    token: tok-a
    proxmox_host: pve.example
"#,
    );
    let err = load_inventory_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("proxmox_node"), "{err}");
}

#[test]
fn rejects_unknown_backend() {
    let file = write_temp(
        r#"
runners:
  - runner_id: r1
    backend: vmware
    token: t
"#,
    );
    assert!(load_inventory_file(file.path()).is_err());
}

#[test]
fn empty_file_yields_empty_inventory() {
    let file = write_temp("runners: []\n");
    let inv = load_inventory_file(file.path()).unwrap();
    assert!(inv.is_empty());
}

#[test]
fn missing_file_is_an_inventory_error() {
    let err = load_inventory_file("/nonexistent/inventory.yml").unwrap_err();
    assert!(matches!(err, StoreError::Inventory(_)));
}
