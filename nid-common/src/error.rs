//! Common error types for NID

use thiserror::Error;

/// Common result type for NID operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error taxonomy across the dashboard backend.
///
/// There is deliberately no `NotFound` variant: operations on ids that do
/// not exist are treated as no-ops returning a zero affected count.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unreadable upload content; aborts the whole import
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Durable backend unreachable or transaction failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
