//! Z-Wave Serial API framing and message model.
//!
//! This crate provides the byte-level protocol layer for talking to a Z-Wave
//! transceiver over a serial transport. Frames are either single control
//! bytes (ACK/NAK/CAN) or length-prefixed SOF frames:
//!
//! ```text
//! +-----+-----+------+------+-------------+-------------+----------+
//! | SOF | len | type | func | payload ... | callbackId? | checksum |
//! +-----+-----+------+------+-------------+-------------+----------+
//! ```
//!
//! `len` counts every byte after it, checksum included. The checksum is the
//! XOR of all bytes between `len` and the checksum itself (both exclusive),
//! seeded with 0xFF.
//!
//! # Layers
//!
//! - [`FrameDecoder`]/[`FrameEncoder`]: raw bytes ↔ discrete frames, with
//!   partial-frame buffering across reads
//! - [`Message`]: a decoded frame plus the derived node id / callback id /
//!   command class fields whose position depends on (type, function)

mod constants;
mod error;
mod frame;
mod message;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use message::*;
