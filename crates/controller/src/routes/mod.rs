// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP route handlers, one module per concern.

pub mod admin;
pub mod checkpoint;
pub mod health;
pub mod internal;
pub mod runner;
pub mod webhook;
pub mod ws;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ep_core::ServiceError;
use serde::Serialize;
use serde_json::json;

/// Error body: `{detail}`, plus structured field errors for validation.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            errors: Vec::new(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: "Validation failed".into(),
            errors,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::new(status, e.detail())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.errors.is_empty() {
            json!({ "detail": self.detail })
        } else {
            json!({ "detail": self.detail, "errors": self.errors })
        };
        (self.status, Json(body)).into_response()
    }
}

/// `^[\w.\-]+$` with a length bound, shared by request identifiers.
pub(crate) fn validate_ident(field: &str, value: &str, max_len: usize) -> Option<FieldError> {
    if value.is_empty() || value.len() > max_len {
        return Some(FieldError {
            field: field.to_string(),
            message: format!("must be 1..={max_len} characters"),
        });
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Some(FieldError {
            field: field.to_string(),
            message: "may only contain word characters, dots, and dashes".to_string(),
        });
    }
    None
}
