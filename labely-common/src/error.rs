//! Common error types for Labely

use thiserror::Error;

/// Common result type for Labely operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Labely crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset manifest failed to parse or violates a dataset invariant
    #[error("Invalid dataset '{name}': {reason}")]
    InvalidDataset { name: String, reason: String },
}
