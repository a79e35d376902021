// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response DTOs shared by the HTTP surface and the WS service path.

use chrono::{DateTime, Utc};
use ep_core::RunnerConfig;
use ep_store::{Checkpoint, RunnerRecord};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckpointResponse {
    pub name: String,
    pub runner_id: String,
    pub job_id: String,
    pub state: String,
    pub finalize_status: Option<String>,
    pub finalize_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&Checkpoint> for CheckpointResponse {
    fn from(cp: &Checkpoint) -> Self {
        CheckpointResponse {
            name: cp.name.clone(),
            runner_id: cp.runner_id.clone(),
            job_id: cp.job_id.clone(),
            state: cp.state.as_str().to_string(),
            finalize_status: cp.finalize_status.map(|s| s.as_str().to_string()),
            finalize_source: cp.finalize_source.clone(),
            created_at: cp.created_at,
            finalized_at: cp.finalized_at,
        }
    }
}

/// Admin view of a runner. The bearer token is included only on
/// creation, `proxmox_token_value` never.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerResponse {
    pub runner_id: String,
    pub backend: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxmox_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxmox_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxmox_token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxmox_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxmox_vmid: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_cmd: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_runner_id: Option<i64>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RunnerResponse {
    pub fn from_record(record: &RunnerRecord, include_token: bool) -> Self {
        let RunnerConfig {
            runner_id,
            backend,
            token,
            proxmox_host,
            proxmox_user,
            proxmox_token_name,
            proxmox_token_value: _,
            proxmox_node,
            proxmox_vmid,
            reset_cmd,
            cleanup_cmd,
            readiness_cmd,
            ci_runner_id,
            tags,
        } = record.config.clone();
        RunnerResponse {
            runner_id,
            backend: backend.as_str().to_string(),
            proxmox_host,
            proxmox_user,
            proxmox_token_name,
            proxmox_node,
            proxmox_vmid,
            reset_cmd,
            cleanup_cmd,
            readiness_cmd,
            ci_runner_id,
            tags,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
            token: include_token.then_some(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ep_core::{CheckpointState, RunnerBackend};

    use super::*;

    #[test]
    fn checkpoint_response_maps_typed_fields_to_strings() {
        let cp = Checkpoint {
            id: 1,
            name: "job-42-1-aabbccdd".into(),
            runner_id: "r1".into(),
            job_id: "42".into(),
            state: CheckpointState::FinalizeQueued,
            finalize_status: Some(ep_core::FinalizeStatus::Success),
            finalize_source: Some("hook".into()),
            created_at: Utc::now(),
            finalized_at: Some(Utc::now()),
        };
        let dto = CheckpointResponse::from(&cp);
        assert_eq!(dto.state, "finalize_queued");
        assert_eq!(dto.finalize_status.as_deref(), Some("success"));
    }

    #[test]
    fn runner_response_never_leaks_the_proxmox_secret() {
        let mut config = RunnerConfig::new("vm-alpha", RunnerBackend::Proxmox);
        config.token = "runner-token".into();
        config.proxmox_token_value = Some("pve-secret".into());
        let record = RunnerRecord {
            id: 1,
            config,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let with_token = RunnerResponse::from_record(&record, true);
        let json = serde_json::to_string(&with_token).unwrap();
        assert!(!json.contains("pve-secret"));
        assert!(json.contains("runner-token"));

        let without = RunnerResponse::from_record(&record, false);
        let json = serde_json::to_string(&without).unwrap();
        assert!(!json.contains("runner-token"));
    }
}
