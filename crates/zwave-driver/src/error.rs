//! Driver-level error type.

use thiserror::Error;

/// Errors surfaced across the driver's public API.
///
/// Expected protocol conditions (timeouts, NAKs, failed transmissions) are
/// reported as boolean outcomes, not errors; these variants cover transport
/// and lifecycle failures.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The transport could not be opened.
    #[error("failed to open transport {port}: {reason}")]
    TransportOpen {
        /// Port identifier handed to the transport.
        port: String,
        /// Transport-reported reason.
        reason: String,
    },

    /// A write was attempted while the transport is closed.
    #[error("transport is not connected")]
    NotConnected,

    /// The driver is shutting down and no longer accepts work.
    #[error("driver is disposed")]
    Disposed,

    /// An outbound frame could not be encoded.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] zwave_proto::ProtoError),

    /// A command-class payload could not be built.
    #[error("payload encoding failed: {0}")]
    Class(#[from] zwave_classes::ClassError),

    /// Snapshot load/save failed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] zwave_model::ModelError),

    /// The addressed node does not exist in the registry.
    #[error("unknown node {0}")]
    UnknownNode(u8),

    /// An application send carried no payload bytes.
    #[error("empty application payload")]
    EmptyPayload,
}
