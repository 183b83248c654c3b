//! Shard error types.
//!
//! Each variant carries a wire-visible code and maps onto one HTTP status;
//! handlers return these directly and axum renders the JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced by the L2 shard.
#[derive(Debug, Error)]
pub enum ShardError {
    /// Referenced session, package, or courier does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with committed state (e.g. re-commit).
    #[error("{0}")]
    Conflict(String),

    /// The workflow stage precondition does not hold.
    #[error("{0}")]
    PreconditionFailed(String),

    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// L1 or a forwarded shard returned a bad response or was unreachable.
    #[error("{0}")]
    Upstream(String),

    /// Storage-layer failure.
    #[error("database error: {0}")]
    Database(String),
}

impl ShardError {
    /// Wire-visible error code.
    pub fn code(&self) -> &'static str {
        match self {
            ShardError::NotFound(_) => "NOT_FOUND",
            ShardError::Conflict(_) => "CONFLICT",
            ShardError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            ShardError::BadRequest(_) => "BAD_REQUEST",
            ShardError::Upstream(_) => "UPSTREAM_ERROR",
            ShardError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// HTTP status the error maps onto.
    pub fn status(&self) -> StatusCode {
        match self {
            ShardError::NotFound(_) => StatusCode::NOT_FOUND,
            ShardError::Conflict(_) => StatusCode::CONFLICT,
            ShardError::PreconditionFailed(_) | ShardError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ShardError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ShardError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for ShardError {
    fn from(e: rusqlite::Error) -> Self {
        ShardError::Database(e.to_string())
    }
}

impl IntoResponse for ShardError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Whether a rusqlite error is a unique-constraint violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(info, _)
            if info.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
