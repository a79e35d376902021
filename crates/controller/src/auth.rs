// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token authentication.
//!
//! Runner tokens resolve through the store; the admin token is a static
//! secret compared in constant time.

use axum::http::HeaderMap;
use ep_core::{ServiceError, Settings};
use sqlx::PgPool;
use subtle::ConstantTimeEq;

fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::Unauthorized)?;
    value
        .strip_prefix("Bearer ")
        .ok_or(ServiceError::Unauthorized)
}

/// Resolve the bearer token to an active runner id.
pub async fn verify_token(pool: &PgPool, headers: &HeaderMap) -> Result<String, ServiceError> {
    let token = bearer_token(headers)?;
    let record = ep_store::runners::find_by_token(pool, token)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .ok_or_else(|| ServiceError::Forbidden("Invalid token".into()))?;
    Ok(record.config.runner_id)
}

/// Admin API guard. 503 when no admin token is configured at all.
pub fn verify_admin(settings: &Settings, headers: &HeaderMap) -> Result<(), ServiceError> {
    let Some(expected) = settings.admin_token.as_deref() else {
        return Err(ServiceError::Unavailable("Admin API not configured".into()));
    };
    let token = bearer_token(headers)?;
    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Invalid admin token".into()))
    }
}

/// Length-safe constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert!(matches!(
            bearer_token(&headers),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let headers = headers_with("Bearer tok-123");
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");
    }

    #[test]
    fn admin_unconfigured_is_unavailable() {
        let settings = Settings::default();
        let headers = headers_with("Bearer anything");
        assert!(matches!(
            verify_admin(&settings, &headers),
            Err(ServiceError::Unavailable(_))
        ));
    }

    #[test]
    fn admin_token_mismatch_is_forbidden() {
        let settings = Settings {
            admin_token: Some("right".into()),
            ..Settings::default()
        };
        assert!(matches!(
            verify_admin(&settings, &headers_with("Bearer wrong")),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(verify_admin(&settings, &headers_with("Bearer right")).is_ok());
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
    }
}
