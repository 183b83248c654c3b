//! L1 error types.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the L1 replica.
#[derive(Debug, Error)]
pub enum L1Error {
    /// Malformed or incomplete commit request.
    #[error("{0}")]
    BadRequest(String),

    /// Commit named a shard the registry does not know.
    #[error("{0}")]
    ShardNotFound(String),

    /// A session with this id was already admitted.
    #[error("{0}")]
    SessionExists(String),

    /// Queried transaction or key does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Consensus did not finalize before the deadline.
    #[error("consensus operation timed out")]
    ConsensusTimeout,

    /// The consensus engine rejected or failed the transaction.
    #[error("{0}")]
    Consensus(String),

    /// Relational index failure.
    #[error("database error: {0}")]
    Database(String),

    /// Keyed ledger store failure.
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl L1Error {
    /// Wire-visible error code.
    pub fn code(&self) -> &'static str {
        match self {
            L1Error::BadRequest(_) => "BAD_REQUEST",
            L1Error::ShardNotFound(_) => "SHARD_NOT_FOUND",
            L1Error::SessionExists(_) => "SESSION_EXISTS",
            L1Error::NotFound(_) => "NOT_FOUND",
            L1Error::ConsensusTimeout => "CONSENSUS_TIMEOUT",
            L1Error::Consensus(_) => "CONSENSUS_ERROR",
            L1Error::Database(_) => "DATABASE_ERROR",
            L1Error::Ledger(_) => "DATABASE_ERROR",
        }
    }

    /// HTTP status the error maps onto.
    pub fn status(&self) -> StatusCode {
        match self {
            L1Error::BadRequest(_) | L1Error::ShardNotFound(_) => StatusCode::BAD_REQUEST,
            L1Error::SessionExists(_) => StatusCode::CONFLICT,
            L1Error::NotFound(_) => StatusCode::NOT_FOUND,
            L1Error::ConsensusTimeout => StatusCode::GATEWAY_TIMEOUT,
            L1Error::Consensus(_) | L1Error::Database(_) | L1Error::Ledger(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for L1Error {
    fn from(e: rusqlite::Error) -> Self {
        L1Error::Database(e.to_string())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_statuses() {
        assert_eq!(L1Error::BadRequest("x".into()).status().as_u16(), 400);
        assert_eq!(L1Error::ShardNotFound("x".into()).code(), "SHARD_NOT_FOUND");
        assert_eq!(L1Error::SessionExists("x".into()).status().as_u16(), 409);
        assert_eq!(L1Error::NotFound("x".into()).status().as_u16(), 404);
        assert_eq!(L1Error::ConsensusTimeout.status().as_u16(), 504);
        assert_eq!(L1Error::Consensus("x".into()).status().as_u16(), 500);
        assert_eq!(L1Error::Database("x".into()).code(), "DATABASE_ERROR");
    }
}
