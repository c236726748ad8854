//! Error types for labely-server
//!
//! One enum covers the labeling taxonomy (not found, invalid label,
//! out-of-sequence, terminal session, concurrent modification) plus
//! infrastructure failures. Every error knows whether the caller should
//! retry the same item or move past it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use labely_common::api::ErrorBody;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for labely-server
#[derive(Debug, Error)]
pub enum Error {
    /// Dataset or item absent
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Label malformed for the task type
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Submitted item is not the session's current item
    #[error("Out of sequence: expected item {expected}, got item {submitted}")]
    OutOfSequence { expected: u64, submitted: u64 },

    /// Session already completed or expired
    #[error("Session {0} is closed")]
    SessionTerminal(Uuid),

    /// Another submission for the same session is in flight or won the race
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("ELO {elo} is below the dataset threshold {required}")]
    EloBelowThreshold { elo: i64, required: i64 },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Common(#[from] labely_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using labely-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for the error body
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) | Error::SessionNotFound(_) => "NOT_FOUND",
            Error::InvalidLabel(_) => "INVALID_LABEL",
            Error::OutOfSequence { .. } => "OUT_OF_SEQUENCE",
            Error::SessionTerminal(_) => "SESSION_TERMINAL",
            Error::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Error::EloBelowThreshold { .. } => "ELO_BELOW_THRESHOLD",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Database(e) if is_transient(e) => "DATABASE_BUSY",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Common(labely_common::Error::Database(e)) if is_transient(e) => "DATABASE_BUSY",
            Error::Common(_) => "COMMON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_LABEL" => StatusCode::UNPROCESSABLE_ENTITY,
            "OUT_OF_SEQUENCE" | "SESSION_TERMINAL" | "CONCURRENT_MODIFICATION" => {
                StatusCode::CONFLICT
            }
            "ELO_BELOW_THRESHOLD" => StatusCode::FORBIDDEN,
            "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "DATABASE_BUSY" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), "CONCURRENT_MODIFICATION" | "DATABASE_BUSY")
    }
}

/// SQLite lock contention and pool exhaustion clear up on their own
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            message.contains("database is locked") || message.contains("database table is locked")
                || message.contains("busy")
        }
        _ => false,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}
