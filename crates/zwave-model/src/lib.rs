//! Node table and capability model for the Z-Wave driver.
//!
//! This crate holds the in-memory representation of the mesh as the driver
//! has discovered it:
//!
//! - [`Node`]: protocol info, advertised command classes, per-class versions,
//!   manufacturer identity, and a typed key→value data bag that command-class
//!   codecs use to stash negotiated per-node state
//! - [`SecuritySession`]: the per-node secure-messaging state (nonces, key
//!   material, pending fragments)
//! - [`NodeRegistry`]: the table of nodes addressed by their 1-byte id
//! - [`RegistrySnapshot`]: the serde form persisted across connects

mod data;
mod error;
mod node;
mod registry;
mod security;
mod snapshot;

pub use data::*;
pub use error::*;
pub use node::*;
pub use registry::*;
pub use security::*;
pub use snapshot::*;
