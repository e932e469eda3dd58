//! Command-class codec layer.
//!
//! Application payloads carried inside serial frames start with
//! `[commandClassId][commandId][...args]`. Each command class has a codec
//! that decodes received payloads into typed [`ClassEvent`]s and offers
//! builders for outgoing commands. A [`ClassRegistry`] maps class id →
//! codec and is the recursion point for the encapsulating classes
//! (MultiInstance/MultiChannel, MultiCmd, CRC16) and for the secure
//! messaging sub-protocol once a payload has been decrypted.
//!
//! Codecs never panic on malformed input: every codec validates its minimum
//! payload length before touching fields, and unknown class ids simply
//! produce no events.

pub mod basic;
pub mod encap;
pub mod ids;
pub mod management;
pub mod security;
pub mod sensor;
pub mod value;

mod error;
mod event;
mod registry;

pub use error::*;
pub use event::*;
pub use registry::*;
