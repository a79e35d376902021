// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command execution for controller-initiated `exec` requests.
//!
//! Commands run in a subshell. Output is capped at 64 KiB per stream
//! (truncated, never rejected) and the process is killed on timeout.
//! Every path returns a structured result.

use std::process::Stdio;
use std::time::Duration;

use ep_wire::ExecResult;
use tokio::process::Command;

/// Per-stream capture cap.
pub const MAX_OUTPUT: usize = 65_536; // 64 KiB

fn truncated(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(MAX_OUTPUT) {
        None => text.into_owned(),
        Some((idx, _)) => text[..idx].to_string(),
    }
}

/// Run `cmd` in a subshell with the given timeout.
pub async fn run_exec(cmd: &str, timeout: Duration) -> ExecResult {
    if cmd.is_empty() {
        return ExecResult {
            exit_code: -1,
            stdout: String::new(),
            stderr: "Empty command".to_string(),
        };
    }

    let child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            return ExecResult {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            }
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: truncated(&output.stdout),
            stderr: truncated(&output.stderr),
        },
        Ok(Err(e)) => ExecResult {
            exit_code: -1,
            stdout: String::new(),
            stderr: e.to_string(),
        },
        // kill_on_drop reaps the child when the future is dropped here.
        Err(_) => ExecResult {
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("Command timed out after {}s", timeout.as_secs_f64()),
        },
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
