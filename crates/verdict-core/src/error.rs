//! Shared error type across verdict crates.

use thiserror::Error;

/// Stable error codes surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Workflow name has no registered chain.
    ChainNotFound,
    /// Configuration is malformed or inconsistent.
    InvalidConfig,
    /// Unsupported config schema version.
    UnsupportedVersion,
    /// Invalid input / malformed request.
    BadRequest,
    /// Internal engine error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ChainNotFound => "CHAIN_NOT_FOUND",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VerdictError>;

/// Unified error type used by core and engine.
///
/// Only configuration-level defects live here. Conditions that are
/// classifiable as a decision (unknown policy id, unreachable backend,
/// deadline) never become errors — they degrade to UNKNOWN results and
/// flow through the aggregation algebra instead.
#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("chain not found: {0}")]
    ChainNotFound(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config schema version")]
    UnsupportedVersion,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl VerdictError {
    /// Map internal error to a stable caller-facing code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            VerdictError::ChainNotFound(_) => ErrorCode::ChainNotFound,
            VerdictError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            VerdictError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            VerdictError::BadRequest(_) => ErrorCode::BadRequest,
            VerdictError::Internal(_) => ErrorCode::Internal,
        }
    }
}
