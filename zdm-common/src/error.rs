//! Common error types for ZDM

use thiserror::Error;

/// Common result type for ZDM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the migrator passes
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest is missing columns or cannot be read
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Invalid input value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
