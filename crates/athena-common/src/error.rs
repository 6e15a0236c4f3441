//! Application error types for Athena services.

use thiserror::Error;

/// Main application error type used across all Athena crates.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed entity construction or update payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lifecycle transition or mutation attempted from a state that forbids it
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Lookup by id found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorization failed - principal lacks permission
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Conflict - e.g., duplicate entry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Reply message without a usable correlation key
    #[error("Missing correlation data: {0}")]
    MissingCorrelationData(String),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Message bus error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 422,
            AppError::IllegalState(_) => 409,
            AppError::NotFound(_) => 404,
            AppError::Forbidden(_) => 403,
            AppError::Conflict(_) => 409,
            AppError::MissingCorrelationData(_) => 400,
            AppError::Decode(_) => 400,
            AppError::Database(_) => 500,
            AppError::Queue(_) => 500,
            AppError::Internal(_) => 500,
        }
    }

    /// Returns the error code string for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::IllegalState(_) => "ILLEGAL_STATE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::MissingCorrelationData(_) => "MISSING_CORRELATION_DATA",
            AppError::Decode(_) => "DECODE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Queue(_) => "QUEUE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors caused by the message itself rather than by infrastructure.
    ///
    /// Redelivering such a message cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::IllegalState(_)
                | AppError::NotFound(_)
                | AppError::Forbidden(_)
                | AppError::Conflict(_)
                | AppError::MissingCorrelationData(_)
                | AppError::Decode(_)
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
