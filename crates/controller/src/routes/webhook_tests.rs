// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ep_core::FinalizeStatus;
use yare::parameterized;

use super::*;

#[parameterized(
    success = { "success", Some(FinalizeStatus::Success) },
    failed = { "failed", Some(FinalizeStatus::Failure) },
    canceled = { "canceled", Some(FinalizeStatus::Canceled) },
    running = { "running", None },
    pending = { "pending", None },
    created = { "created", None },
    unknown = { "skipped", None },
)]
fn gitlab_status_mapping(build_status: &str, expected: Option<FinalizeStatus>) {
    assert_eq!(map_gitlab_status(build_status), expected);
}

#[parameterized(
    success = { "success", Some(FinalizeStatus::Success) },
    failure = { "failure", Some(FinalizeStatus::Failure) },
    cancelled = { "cancelled", Some(FinalizeStatus::Canceled) },
    timed_out = { "timed_out", Some(FinalizeStatus::Failure) },
    neutral = { "neutral", None },
    action_required = { "action_required", None },
)]
fn github_conclusion_mapping(conclusion: &str, expected: Option<FinalizeStatus>) {
    assert_eq!(map_github_conclusion(conclusion), expected);
}

#[test]
fn gitlab_token_comparison_is_exact() {
    assert!(verify_gitlab_token(Some("s3cret"), Some("s3cret")));
    assert!(!verify_gitlab_token(Some("s3cret"), Some("S3CRET")));
    assert!(!verify_gitlab_token(Some("s3cret"), None));
    assert!(!verify_gitlab_token(Some("s3cret"), Some("s3cret ")));
}

#[test]
fn github_signature_matches_reference_vector() {
    // Computed with Python's hmac over the same inputs.
    let body = br#"{"action":"completed"}"#;
    assert_eq!(
        github_signature("topsecret", body),
        "sha256=c96abeacd0efc7417a4388c72461e90d30e943f6155753b25ded5a381fbe9ad1"
    );
}

#[test]
fn github_signature_verification_round_trips() {
    let body = br#"{"workflow_job":{"id":12345,"conclusion":"success"}}"#;
    let header = github_signature("hush", body);
    assert!(verify_github_signature("hush", body, &header));
    assert!(!verify_github_signature("hush", body, "sha256=deadbeef"));
    assert!(!verify_github_signature("other", body, &header));
    assert!(!verify_github_signature("hush", b"tampered", &header));
}

#[test]
fn numeric_and_string_job_ids_normalize() {
    assert_eq!(
        value_to_id(&serde_json::json!(12345)),
        Some("12345".to_string())
    );
    assert_eq!(
        value_to_id(&serde_json::json!("job-7")),
        Some("job-7".to_string())
    );
    assert_eq!(value_to_id(&serde_json::json!("")), None);
    assert_eq!(value_to_id(&serde_json::json!(null)), None);
}
