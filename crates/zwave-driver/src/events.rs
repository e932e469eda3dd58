//! Events delivered to the embedding application.

use zwave_classes::Decoded;

/// Phase of a network-membership operation (inclusion/exclusion/heal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The controller entered learn mode and is waiting for a node.
    Started,
    /// A node was found and is being processed.
    InProgress,
    /// The operation finished successfully.
    Done,
    /// The operation failed or was cancelled.
    Failed,
}

/// Events emitted by the driver, delivered over a crossbeam channel.
///
/// The channel is unbounded; a slow consumer delays nothing in the
/// protocol engine.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// The transport connection came up or went down.
    ControllerStatusChanged {
        /// Whether the controller is reachable.
        connected: bool,
    },

    /// Initial discovery progress for one node.
    DiscoveryProgress {
        /// Node being interviewed.
        node_id: u8,
        /// Whether the node's information frame has been received.
        complete: bool,
    },

    /// Neighbor-rediscovery (heal) progress for one node.
    HealProgress {
        /// Node being healed.
        node_id: u8,
        /// Operation phase.
        status: OperationStatus,
    },

    /// Inclusion/exclusion/failed-node operation progress.
    NodeOperationProgress {
        /// Affected node, 0 while no node id is known yet.
        node_id: u8,
        /// Operation phase.
        status: OperationStatus,
    },

    /// A node produced typed command-class events.
    NodeUpdated {
        /// Source node.
        node_id: u8,
        /// Decoded events in wire order.
        events: Vec<Decoded>,
    },
}
