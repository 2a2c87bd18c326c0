//! Common error types for the clinic portal

use thiserror::Error;

/// Common result type for clinic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the clinic services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error at a wire or mirror boundary
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed value or payload (bad day name, unknown wire event, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Required form fields missing; shown to the user before any write
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A write was attempted without an active session
    #[error("No active session")]
    Unauthenticated,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

