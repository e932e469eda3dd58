//! Frame encoding and incremental decoding.
//!
//! The serial stream mixes single-byte control frames (ACK/NAK/CAN) with
//! length-prefixed SOF frames, and reads from the transport can split one
//! frame across calls or glue several frames together. [`FrameDecoder`]
//! buffers the remainder between calls so callers can simply feed it every
//! chunk the transport produces.

use bytes::{Buf, BytesMut};

use crate::constants::*;
use crate::error::ProtoError;

/// Compute the frame checksum: XOR over `bytes`, seeded with 0xFF.
///
/// For outbound frames this is applied to everything between the SOF byte
/// and the checksum position; a correctly checksummed frame XORs to zero
/// over `frame[1..]`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0xFF, |acc, b| acc ^ b)
}

/// Verify the trailing checksum of a complete SOF frame.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < 5 || frame[0] != SOF {
        return false;
    }
    checksum(&frame[1..frame.len() - 1]) == frame[frame.len() - 1]
}

/// One frame demultiplexed from the serial stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialFrame {
    /// Single-byte acknowledge.
    Ack,
    /// Single-byte negative acknowledge.
    Nak,
    /// Single-byte cancel.
    Can,
    /// Complete SOF frame with a valid checksum (SOF byte included).
    Data(Vec<u8>),
    /// Complete SOF frame whose checksum did not verify.
    ///
    /// The driver replies NAK and drops these; they are surfaced so that
    /// the reply can happen at the transport layer.
    BadChecksum(Vec<u8>),
}

/// Outbound frame builder.
///
/// Owns the callback-id counter shared by all outbound frames. Ids cycle
/// through [2, 255]; 0 means "no callback requested" on the wire and 1 is
/// avoided because some transceiver firmwares reserve it.
#[derive(Debug)]
pub struct FrameEncoder {
    next_callback_id: u8,
}

impl FrameEncoder {
    /// Smallest callback id handed out.
    pub const FIRST_CALLBACK_ID: u8 = 0x02;

    /// Create a new encoder with the callback sequence at its start.
    pub fn new() -> Self {
        FrameEncoder {
            next_callback_id: Self::FIRST_CALLBACK_ID,
        }
    }

    /// Take the next callback id, cycling within [2, 255].
    pub fn next_callback_id(&mut self) -> u8 {
        let id = self.next_callback_id;
        self.next_callback_id = if id == 0xFF {
            Self::FIRST_CALLBACK_ID
        } else {
            id + 1
        };
        id
    }

    /// Build an outbound SOF frame.
    ///
    /// `payload` is the function-specific body following the function id.
    /// When `want_callback` is set a fresh callback id is appended before
    /// the checksum and returned alongside the frame bytes.
    pub fn encode(
        &mut self,
        msg_type: u8,
        function: u8,
        payload: &[u8],
        want_callback: bool,
    ) -> Result<(Vec<u8>, Option<u8>), ProtoError> {
        // len counts type + function + payload + optional callback + checksum
        let body_len = 3 + payload.len() + usize::from(want_callback);
        if body_len > 0xFF {
            return Err(ProtoError::FrameTooLong {
                max: 0xFF - 3,
                actual: payload.len(),
            });
        }

        let mut frame = Vec::with_capacity(2 + body_len);
        frame.push(SOF);
        frame.push(body_len as u8);
        frame.push(msg_type);
        frame.push(function);
        frame.extend_from_slice(payload);

        let callback_id = if want_callback {
            let id = self.next_callback_id();
            frame.push(id);
            Some(id)
        } else {
            None
        };

        frame.push(checksum(&frame[1..]));
        Ok((frame, callback_id))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental frame demultiplexer.
///
/// Feed raw transport bytes with [`push`](Self::push), then drain complete
/// frames with [`decode`](Self::decode) until it returns `None`. Partial
/// SOF frames are retained across calls; control bytes glued to trailing
/// data are split off immediately and the remainder stays buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete frame from the buffer.
    ///
    /// Returns `None` when more data is needed. Unrecognized bytes before a
    /// frame header are discarded.
    pub fn decode(&mut self) -> Option<SerialFrame> {
        loop {
            // Resync: skip anything that is not a known header byte.
            while !self.buffer.is_empty()
                && !matches!(self.buffer[0], SOF | ACK | NAK | CAN)
            {
                log::trace!("discarding stray byte 0x{:02X}", self.buffer[0]);
                self.buffer.advance(1);
            }

            let first = *self.buffer.first()?;
            match first {
                ACK => {
                    self.buffer.advance(1);
                    return Some(SerialFrame::Ack);
                }
                NAK => {
                    self.buffer.advance(1);
                    return Some(SerialFrame::Nak);
                }
                CAN => {
                    self.buffer.advance(1);
                    return Some(SerialFrame::Can);
                }
                _ => {}
            }

            // SOF frame: need the length byte, then the full body.
            if self.buffer.len() < 2 {
                return None;
            }
            let body_len = self.buffer[1] as usize;
            if body_len < 3 {
                // Too short to hold type + function + checksum; the SOF byte
                // was noise. Drop it and resync.
                log::trace!("dropping SOF with invalid length {}", body_len);
                self.buffer.advance(1);
                continue;
            }

            let total = 2 + body_len;
            if self.buffer.len() < total {
                return None;
            }

            let frame = self.buffer.split_to(total).to_vec();
            return if verify_checksum(&frame) {
                Some(SerialFrame::Data(frame))
            } else {
                log::debug!("checksum mismatch on frame {}", hex::encode(&frame));
                Some(SerialFrame::BadChecksum(frame))
            };
        }
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
