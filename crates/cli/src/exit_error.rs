// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

/// Operation failed (bad request, server-side error).
pub const EXIT_OPERATION: i32 = 1;
/// The local agent is unreachable.
pub const EXIT_AGENT_UNREACHABLE: i32 = 2;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        Self::new(EXIT_OPERATION, message)
    }

    pub fn agent_unreachable(message: impl Into<String>) -> Self {
        Self::new(EXIT_AGENT_UNREACHABLE, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
