// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitLab CI adapter.
//!
//! Jobs API for status lookups, Runners API for pause/unpause. GitLab's
//! vocabulary is wider than ours: everything pre-terminal (`manual`,
//! `pending`, `created`, ...) normalizes to `running`.

use std::time::Duration;

use async_trait::async_trait;
use ep_core::Settings;
use serde_json::json;

use crate::{CiAdapter, CiError, JobStatus};

pub struct GitLabAdapter {
    base_url: String,
    token: String,
    project_id: Option<i64>,
    client: reqwest::Client,
}

/// Map a GitLab job status string to the normalized vocabulary.
pub(crate) fn normalize_status(gitlab_status: &str) -> JobStatus {
    match gitlab_status {
        "success" => JobStatus::Success,
        "failed" => JobStatus::Failure,
        "canceled" => JobStatus::Canceled,
        // running | manual | pending | created | anything new
        _ => JobStatus::Running,
    }
}

impl GitLabAdapter {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, project_id: Option<i64>) -> Self {
        Self::with_timeout(base_url, token, project_id, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        project_id: Option<i64>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            token: token.into(),
            project_id,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, CiError> {
        let url = settings
            .gitlab_url
            .clone()
            .ok_or_else(|| CiError::NotConfigured("gitlab_url is not set".into()))?;
        let token = settings
            .gitlab_token
            .clone()
            .ok_or_else(|| CiError::NotConfigured("gitlab_token is not set".into()))?;
        Ok(Self::with_timeout(
            url,
            token,
            settings.gitlab_project_id,
            Duration::from_secs(settings.http_timeout_seconds),
        ))
    }

    fn job_url(&self, job_id: &str) -> String {
        match self.project_id {
            Some(project) => format!("{}/api/v4/projects/{project}/jobs/{job_id}", self.base_url),
            None => format!("{}/api/v4/jobs/{job_id}", self.base_url),
        }
    }

    async fn set_runner_active(&self, ci_runner_id: i64, active: bool) -> Result<(), CiError> {
        let url = format!("{}/api/v4/runners/{ci_runner_id}", self.base_url);
        let resp = self
            .client
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&json!({ "active": active }))
            .send()
            .await
            .map_err(|e| CiError::Transport(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(CiError::NotFound(format!("Runner {ci_runner_id} not found")));
        }
        if !resp.status().is_success() {
            return Err(CiError::Api(format!(
                "runner update failed with HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CiAdapter for GitLabAdapter {
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, CiError> {
        let resp = self
            .client
            .get(self.job_url(job_id))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| CiError::Transport(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(CiError::NotFound(format!("Job {job_id} not found")));
        }
        if !resp.status().is_success() {
            return Err(CiError::Api(format!(
                "job lookup failed with HTTP {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CiError::Api(format!("invalid job response: {e}")))?;
        let status = body
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CiError::Api("job response missing 'status'".into()))?;
        Ok(normalize_status(status))
    }

    async fn pause_runner(&self, ci_runner_id: i64) -> Result<(), CiError> {
        self.set_runner_active(ci_runner_id, false).await
    }

    async fn unpause_runner(&self, ci_runner_id: i64) -> Result<(), CiError> {
        self.set_runner_active(ci_runner_id, true).await
    }
}

#[cfg(test)]
#[path = "gitlab_tests.rs"]
mod tests;
