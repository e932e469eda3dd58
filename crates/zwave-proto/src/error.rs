//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when framing or parsing serial API data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame payload would exceed the 8-bit length field.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length requested.
        actual: usize,
    },

    /// Message type byte is neither request nor response.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),
}
