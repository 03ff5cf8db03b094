//! Error types for telldus-core.
//!
//! Errors are split by how far they reach:
//!
//! | Error | Scope | Effect |
//! |-------|-------|--------|
//! | [`telldus_types::ValueParseError`] | one reading | reading skipped and logged |
//! | [`SensorError`] | one sensor | sensor aborted, watermark untouched, other sensors continue |
//! | [`SyncError`] | whole run | nothing is synced |
//!
//! [`RemoteFetchError`] is what the remote API layer returns; it becomes a
//! [`SensorError`] when fetching history, or a [`SyncError`] when the sensor
//! roster itself cannot be listed.

use thiserror::Error;

/// A request to the remote API did not produce usable data.
#[derive(Debug, Error)]
pub enum RemoteFetchError {
    /// The API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The request never completed (connect failure, timeout, TLS, ...).
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The API answered 200 with a body that does not match the expected shape.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request could not be signed.
    #[error("failed to sign request: {0}")]
    Signing(String),
}

impl RemoteFetchError {
    /// HTTP status for [`RemoteFetchError::Status`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteFetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of one sensor's fetch/transform/write/advance pipeline.
#[derive(Debug, Error)]
pub enum SensorError {
    /// History could not be fetched.
    #[error("failed to fetch history: {0}")]
    Fetch(#[from] RemoteFetchError),

    /// The persisted watermark could not be read.
    #[error("failed to read watermark: {0}")]
    StorageRead(#[source] telldus_store::Error),

    /// Records could not be written; the watermark was not advanced.
    #[error("failed to write readings: {0}")]
    StorageWrite(#[source] telldus_store::Error),

    /// Records were written but the new watermark could not be stored.
    ///
    /// The next run re-fetches the same range, which is safe because writes
    /// are keyed.
    #[error("failed to advance watermark: {0}")]
    WatermarkWrite(#[source] telldus_store::Error),

    /// The sensor's pipeline task did not complete.
    #[error("sensor task failed: {0}")]
    Task(String),
}

/// Failure of a whole sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run holds the run lock.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    /// The sensor roster could not be listed.
    #[error("failed to list sensors: {0}")]
    ListSensors(#[source] RemoteFetchError),
}

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, SyncError>;
