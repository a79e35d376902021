// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn defaults_match_the_documented_values() {
    let s = Settings::default();
    assert_eq!(s.finalize_cooldown_seconds, 5);
    assert_eq!(s.checkpoint_ttl_seconds, 1800);
    assert_eq!(s.gc_interval_seconds, 60);
    assert_eq!(s.poller_interval_seconds, 20);
    assert_eq!(s.poller_min_age_seconds, 120);
    assert_eq!(s.reconcile_interval_seconds, 120);
    assert_eq!(s.query_batch_size, 200);
    assert_eq!(s.task_soft_time_limit, 300);
    assert_eq!(s.task_hard_time_limit, 330);
    assert_eq!(s.ws_heartbeat_interval, 30);
    assert_eq!(s.ws_heartbeat_timeout, 90);
    assert!(s.poller_enabled);
    assert!(s.admin_token.is_none());
}

#[test]
#[serial]
fn env_overrides_apply() {
    std::env::set_var("E2EPOOL_GC_INTERVAL_SECONDS", "7");
    std::env::set_var("E2EPOOL_POLLER_ENABLED", "false");
    std::env::set_var("E2EPOOL_GITLAB_URL", "https://gitlab.example");
    let s = Settings::from_env();
    std::env::remove_var("E2EPOOL_GC_INTERVAL_SECONDS");
    std::env::remove_var("E2EPOOL_POLLER_ENABLED");
    std::env::remove_var("E2EPOOL_GITLAB_URL");

    assert_eq!(s.gc_interval_seconds, 7);
    assert!(!s.poller_enabled);
    assert_eq!(s.gitlab_url.as_deref(), Some("https://gitlab.example"));
}

#[test]
#[serial]
fn unparsable_values_fall_back_to_defaults() {
    std::env::set_var("E2EPOOL_QUERY_BATCH_SIZE", "not-a-number");
    std::env::set_var("E2EPOOL_GITLAB_PROJECT_ID", "");
    let s = Settings::from_env();
    std::env::remove_var("E2EPOOL_QUERY_BATCH_SIZE");
    std::env::remove_var("E2EPOOL_GITLAB_PROJECT_ID");

    assert_eq!(s.query_batch_size, 200);
    assert_eq!(s.gitlab_project_id, None);
}
