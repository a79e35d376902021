// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint lifecycle states and name handling.
//!
//! A checkpoint is born `created`, moves to `finalize_queued` when a
//! terminal job status arrives, and lands in one of the terminal states.
//! The database enforces that at most one active checkpoint exists per
//! runner; this module only encodes which transitions are legal.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// States in which a checkpoint still owns its runner.
pub const ACTIVE_STATES: [CheckpointState; 2] =
    [CheckpointState::Created, CheckpointState::FinalizeQueued];

/// States a checkpoint never leaves.
pub const TERMINAL_STATES: [CheckpointState; 3] = [
    CheckpointState::Reset,
    CheckpointState::Deleted,
    CheckpointState::GcReset,
];

/// Lifecycle state of a checkpoint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Created,
    FinalizeQueued,
    Reset,
    /// Legacy success fast-path; no current code path writes it.
    Deleted,
    GcReset,
}

impl CheckpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointState::Created => "created",
            CheckpointState::FinalizeQueued => "finalize_queued",
            CheckpointState::Reset => "reset",
            CheckpointState::Deleted => "deleted",
            CheckpointState::GcReset => "gc_reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(CheckpointState::Created),
            "finalize_queued" => Some(CheckpointState::FinalizeQueued),
            "reset" => Some(CheckpointState::Reset),
            "deleted" => Some(CheckpointState::Deleted),
            "gc_reset" => Some(CheckpointState::GcReset),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CheckpointState::Created | CheckpointState::FinalizeQueued
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Legal lifecycle edges. Everything else is an invariant violation.
    pub fn can_transition_to(&self, next: CheckpointState) -> bool {
        matches!(
            (self, next),
            (CheckpointState::Created, CheckpointState::FinalizeQueued)
                | (CheckpointState::FinalizeQueued, CheckpointState::Reset)
                | (CheckpointState::Created, CheckpointState::GcReset)
        )
    }
}

impl std::fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of the CI job, recorded when finalize is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    Success,
    Failure,
    Canceled,
}

impl FinalizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeStatus::Success => "success",
            FinalizeStatus::Failure => "failure",
            FinalizeStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FinalizeStatus::Success),
            "failure" => Some(FinalizeStatus::Failure),
            "canceled" => Some(FinalizeStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for FinalizeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern enforced on the finalize path. Job ids may carry word
/// characters, dots, and dashes; the suffix is always 8 lowercase hex.
#[allow(clippy::expect_used)]
static CHECKPOINT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^job-[\w.\-]+-\d+-[0-9a-f]{8}$").expect("constant regex pattern is valid")
});

/// Build a checkpoint name: `job-{job_id}-{unix_seconds}-{8 hex}`.
pub fn generate_checkpoint_name(job_id: &str, unix_seconds: i64) -> String {
    let suffix: u32 = rand::random();
    format!("job-{job_id}-{unix_seconds}-{suffix:08x}")
}

pub fn is_valid_checkpoint_name(name: &str) -> bool {
    CHECKPOINT_NAME.is_match(name)
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
