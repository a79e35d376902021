// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-layer error taxonomy.
//!
//! Every variant carries the HTTP status the controller surface maps it
//! to; workers treat the same variants as retry/skip signals.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid authorization header")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cooldown period active, try again later")]
    Cooldown,

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status code the controller responds with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 422,
            ServiceError::NotFound(_) => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::Conflict(_) => 409,
            ServiceError::Cooldown => 429,
            ServiceError::Unavailable(_) => 503,
            ServiceError::GatewayTimeout(_) => 504,
            ServiceError::Backend(_) => 502,
            ServiceError::Internal(_) => 500,
        }
    }

    pub fn detail(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_taxonomy() {
        assert_eq!(ServiceError::Validation("x".into()).status_code(), 422);
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
        assert_eq!(ServiceError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ServiceError::Cooldown.status_code(), 429);
        assert_eq!(ServiceError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(ServiceError::GatewayTimeout("x".into()).status_code(), 504);
        assert_eq!(ServiceError::Backend("x".into()).status_code(), 502);
    }

    #[test]
    fn detail_is_the_display_form() {
        let err = ServiceError::Conflict("active checkpoint exists".into());
        assert_eq!(err.detail(), "active checkpoint exists");
    }
}
