// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ep-ci: CI platform adapters.
//!
//! The engine only needs three capabilities from a CI platform: look up
//! a job's status, and pause/unpause a runner. Adapters normalize each
//! provider's status vocabulary into [`JobStatus`].

mod gitlab;

use std::sync::Arc;

use async_trait::async_trait;
use ep_core::Settings;
use thiserror::Error;

pub use gitlab::GitLabAdapter;

/// Normalized job status across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Success,
    Failure,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Canceled => "canceled",
        }
    }

    /// The finalize status a terminal job maps to; `None` while running.
    pub fn as_finalize_status(&self) -> Option<ep_core::FinalizeStatus> {
        match self {
            JobStatus::Running => None,
            JobStatus::Success => Some(ep_core::FinalizeStatus::Success),
            JobStatus::Failure => Some(ep_core::FinalizeStatus::Failure),
            JobStatus::Canceled => Some(ep_core::FinalizeStatus::Canceled),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CiError {
    #[error("{0}")]
    NotFound(String),

    #[error("CI transport error: {0}")]
    Transport(String),

    #[error("CI API error: {0}")]
    Api(String),

    #[error("CI adapter not configured: {0}")]
    NotConfigured(String),
}

/// Capability set the engine consumes from a CI platform.
#[async_trait]
pub trait CiAdapter: Send + Sync {
    /// Normalized status of a CI job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, CiError>;

    /// Stop the platform from dispatching new jobs to a runner.
    async fn pause_runner(&self, ci_runner_id: i64) -> Result<(), CiError>;

    /// Resume dispatching.
    async fn unpause_runner(&self, ci_runner_id: i64) -> Result<(), CiError>;
}

/// Build the configured provider's adapter. Providers are keyed by the
/// `ci_provider` setting; unknown tags are a configuration error.
pub fn build_adapter(settings: &Settings) -> Result<Arc<dyn CiAdapter>, CiError> {
    match settings.ci_provider.as_str() {
        "gitlab" => Ok(Arc::new(GitLabAdapter::from_settings(settings)?)),
        other => Err(CiError::NotConfigured(format!("unknown CI provider '{other}'"))),
    }
}
