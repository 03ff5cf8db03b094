//! Error types for telldus-store.

use std::path::PathBuf;

/// Result type for telldus-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in telldus-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A multi-put exceeded the backend's per-call limit.
    #[error("Batch of {len} entries exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// A chunk of a batched write failed; earlier chunks are already durable.
    #[error("Chunk {chunk} failed after {written} records were written: {source}")]
    ChunkFailed {
        chunk: usize,
        written: usize,
        #[source]
        source: Box<Error>,
    },

    /// The backend is not reachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The database was written by a schema version this build does not know.
    #[error("Unsupported schema version {0}")]
    UnsupportedSchema(i32),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
