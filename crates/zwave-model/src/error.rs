//! Model error types.

use thiserror::Error;

/// Errors that can occur when loading or saving model state.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot content was not valid JSON.
    #[error("snapshot parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A hex-encoded field did not decode.
    #[error("invalid hex in field {field}: {source}")]
    InvalidHex {
        /// Name of the offending field.
        field: &'static str,
        /// Underlying decode error.
        source: hex::FromHexError,
    },

    /// A key field had the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
}
