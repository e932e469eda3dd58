//! Codec error types.

use thiserror::Error;

/// Errors that can occur while decoding or encoding command-class payloads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassError {
    /// Payload is shorter than the command's minimum length.
    #[error("class 0x{class:02X}: payload too short, expected at least {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Command class id.
        class: u8,
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Scaled value uses a size other than 1, 2, or 4 bytes.
    #[error("invalid scaled value size: {0}")]
    InvalidValueSize(u8),

    /// Value cannot be represented within 3 precision bits.
    #[error("value {0} needs more than 7 decimal digits of precision")]
    PrecisionOverflow(f64),

    /// Value magnitude exceeds the signed 32-bit wire range.
    #[error("value {0} out of range for a 32-bit scaled value")]
    ValueOutOfRange(f64),

    /// Encapsulated frame failed its CRC check.
    #[error("CRC16 mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch {
        /// CRC computed over the frame.
        expected: u16,
        /// CRC carried in the frame.
        actual: u16,
    },

    /// Encrypted message failed authentication.
    #[error("message authentication failed for node {node}")]
    AuthenticationFailed {
        /// Sending node.
        node: u8,
    },

    /// No usable nonce for an encrypt/decrypt attempt.
    #[error("nonce unavailable or expired for node {node}")]
    NonceUnavailable {
        /// Peer node.
        node: u8,
    },
}

/// Uniform minimum-length guard used by every codec before field access.
pub(crate) fn require_len(class: u8, payload: &[u8], min: usize) -> Result<(), ClassError> {
    if payload.len() < min {
        Err(ClassError::PayloadTooShort {
            class,
            expected: min,
            actual: payload.len(),
        })
    } else {
        Ok(())
    }
}
