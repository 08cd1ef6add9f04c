//! Error types for the staking indexer domain model.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or validating domain values.
#[derive(Error, Debug)]
pub enum Error {
    /// A token amount could not be parsed as an unsigned integer.
    #[error("invalid amount '{value}': {reason}")]
    InvalidAmount {
        /// The raw value that failed to parse.
        value: String,
        /// Description of what's wrong.
        reason: &'static str,
    },

    /// An address or transaction hash has the wrong shape.
    #[error("invalid {field} '{value}': expected 0x followed by {expected_len} hex characters")]
    InvalidHex {
        /// The name of the invalid field.
        field: &'static str,
        /// The raw value.
        value: String,
        /// Number of hex characters expected after the `0x` prefix.
        expected_len: usize,
    },

    /// Timestamp cannot be rendered as a calendar date.
    #[error("timestamp {0} is outside the representable calendar range")]
    TimestampOutOfRange(u64),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
