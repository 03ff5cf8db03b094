//! Error types for record conversion in telldus-types.

use thiserror::Error;

/// A single reading could not be turned into a stored record.
///
/// These errors are scoped to one data point: callers skip the reading and
/// carry on with the rest of the sensor's history.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValueParseError {
    /// The value is neither a number nor a numeric string.
    #[error("value {value:?} of measurement '{name}' is not numeric")]
    NotNumeric { name: String, value: String },

    /// The event timestamp cannot be represented as a datetime.
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// Result type alias using telldus-types' ValueParseError type.
pub type ParseResult<T> = std::result::Result<T, ValueParseError>;
