//! Common error types for PrediApp

use thiserror::Error;

/// Common result type for PrediApp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the PrediApp services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid payload, duplicate drivers, invalid session name/type pair
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Race prediction against a non-race session or vice versa; carries
    /// its own error code so clients can surface the specific mismatch
    #[error("Variant mismatch: {0}")]
    VariantMismatch(String),

    /// Prediction window closed, or action attempted by a non-owner
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate prediction, duplicate session key, or a concurrent
    /// ingestion attempt on the same session
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External timing API returned non-2xx, timed out, or replied with
    /// malformed JSON
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Request deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
