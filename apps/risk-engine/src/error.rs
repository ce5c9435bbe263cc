//! Structured error handling for the risk engine.
//!
//! Gate rejections are *not* errors: they are ordinary data inside an
//! [`ApprovalResult`](crate::models::ApprovalResult). The error types here
//! cover the genuinely exceptional paths: malformed limit updates, missing
//! or stale market inputs that cannot be degraded around, and write
//! conflicts against the portfolio store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for the risk engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request or out-of-range field.
    ValidationError,
    /// Required market input missing and no conservative fallback applies.
    DataUnavailable,
    /// Write against a stale portfolio snapshot, retry exhausted.
    ConcurrencyConflict,
    /// Referenced position does not exist or is already closed.
    PositionNotFound,
    /// Circuit breaker reset preconditions not met.
    ResetRefused,
}

impl ErrorCode {
    /// Stable reason string for logs and callers.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DataUnavailable => "DATA_UNAVAILABLE",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::PositionNotFound => "POSITION_NOT_FOUND",
            Self::ResetRefused => "RESET_REFUSED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the risk engine.
#[derive(Debug, Error)]
pub struct RiskError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl RiskError {
    /// Create a new risk error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Malformed request or limit update.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Missing or stale input with no degradation path.
    #[must_use]
    pub fn data_unavailable(symbol: &str, what: impl Into<String>) -> Self {
        Self::new(ErrorCode::DataUnavailable, what).with_context("symbol", symbol)
    }

    /// Stale snapshot write conflict.
    #[must_use]
    pub fn conflict(expected_version: u64, actual_version: u64) -> Self {
        Self::new(
            ErrorCode::ConcurrencyConflict,
            "portfolio snapshot is stale",
        )
        .with_context("expected_version", expected_version.to_string())
        .with_context("actual_version", actual_version.to_string())
    }

    /// Position lookup failure.
    #[must_use]
    pub fn position_not_found(symbol: &str) -> Self {
        Self::new(
            ErrorCode::PositionNotFound,
            format!("position {symbol} not found"),
        )
        .with_context("symbol", symbol)
    }
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}
