//! Error types for tensorps.

use thiserror::Error;

/// Result type alias for tensorps operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tensorps operations.
#[derive(Error, Debug)]
pub enum Error {
    // Decode errors
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    // Merge errors
    #[error("Embedding table not found: {0}")]
    EmbeddingTableNotFound(String),

    #[error("Dimension mismatch for table {table}: expected {expected}, got {actual}")]
    DimensionMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stale version: current {current}, incoming {incoming}")]
    StaleVersion { current: i32, incoming: i32 },

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
