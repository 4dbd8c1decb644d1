//! Error types for OpsRunner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Runner integration disabled or missing its endpoint/credential.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The call to the runner failed: timeout, connection error, non-2xx or
    /// a malformed response body.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("store write failed: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
