//! Serial API protocol constants
//!
//! These constants define the frame headers, function ids, and status codes
//! used by the Z-Wave transceiver's serial API.

// ============================================================================
// Frame Headers
// ============================================================================

/// Start of a length-prefixed data frame.
pub const SOF: u8 = 0x01;
/// Frame acknowledged by the receiver.
pub const ACK: u8 = 0x06;
/// Frame rejected (bad checksum); sender should retransmit.
pub const NAK: u8 = 0x15;
/// Frame cancelled; the transceiver dropped the pending transaction.
pub const CAN: u8 = 0x18;

// ============================================================================
// Message Types
// ============================================================================

/// Host-initiated command or transceiver-initiated callback.
pub const MSG_TYPE_REQUEST: u8 = 0x00;
/// Immediate answer to a request.
pub const MSG_TYPE_RESPONSE: u8 = 0x01;

// ============================================================================
// Function Ids (host ↔ transceiver)
// ============================================================================

/// Get the initial node bitmask and chip information.
pub const FUNC_GET_INIT_DATA: u8 = 0x02;
/// Incoming application command from a remote node.
pub const FUNC_APPLICATION_COMMAND_HANDLER: u8 = 0x04;
/// Get the serial API capabilities of the transceiver.
pub const FUNC_GET_CAPABILITIES: u8 = 0x07;
/// Soft-reset the serial API.
pub const FUNC_SOFT_RESET: u8 = 0x08;
/// Send an application payload to a node.
pub const FUNC_SEND_DATA: u8 = 0x13;
/// Get the Z-Wave library version string.
pub const FUNC_GET_VERSION: u8 = 0x15;
/// Get the home id and controller node id.
pub const FUNC_MEMORY_GET_ID: u8 = 0x20;
/// Get basic/generic/specific type and capability flags for a node.
pub const FUNC_GET_NODE_PROTOCOL_INFO: u8 = 0x41;
/// Reset the controller to factory defaults.
pub const FUNC_SET_DEFAULT: u8 = 0x42;
/// Ask a node to rediscover its neighbors.
pub const FUNC_REQUEST_NODE_NEIGHBOR_UPDATE: u8 = 0x48;
/// Unsolicited node information update (node info frame received, etc).
pub const FUNC_APPLICATION_UPDATE: u8 = 0x49;
/// Start/stop inclusion of a new node.
pub const FUNC_ADD_NODE_TO_NETWORK: u8 = 0x4A;
/// Start/stop exclusion of a node.
pub const FUNC_REMOVE_NODE_FROM_NETWORK: u8 = 0x4B;
/// Hand the primary controller role to another controller.
pub const FUNC_CONTROLLER_CHANGE: u8 = 0x4D;
/// Request a node's node information frame.
pub const FUNC_REQUEST_NODE_INFO: u8 = 0x60;
/// Remove a node that is on the failed-node list.
pub const FUNC_REMOVE_FAILED_NODE: u8 = 0x61;
/// Check whether a node is on the failed-node list.
pub const FUNC_IS_FAILED_NODE: u8 = 0x62;
/// Replace a failed node with a new one.
pub const FUNC_REPLACE_FAILED_NODE: u8 = 0x63;
/// Get the routing table entry for a node.
pub const FUNC_GET_ROUTING_INFO: u8 = 0x80;

// ============================================================================
// Transmit Options (SendData)
// ============================================================================

/// Request a mesh-level acknowledgement from the destination.
pub const TRANSMIT_OPTION_ACK: u8 = 0x01;
/// Transmit at low output power.
pub const TRANSMIT_OPTION_LOW_POWER: u8 = 0x02;
/// Allow routing through repeater nodes.
pub const TRANSMIT_OPTION_AUTO_ROUTE: u8 = 0x04;
/// Allow explorer-frame fallback routing.
pub const TRANSMIT_OPTION_EXPLORE: u8 = 0x20;

// ============================================================================
// Transmit Complete Codes (SendData callback status)
// ============================================================================

/// Delivery confirmed.
pub const TRANSMIT_COMPLETE_OK: u8 = 0x00;
/// Destination did not acknowledge.
pub const TRANSMIT_COMPLETE_NO_ACK: u8 = 0x01;
/// Transmission failed (network busy).
pub const TRANSMIT_COMPLETE_FAIL: u8 = 0x02;
/// Transceiver not idle.
pub const TRANSMIT_COMPLETE_NOT_IDLE: u8 = 0x03;
/// No route to destination.
pub const TRANSMIT_COMPLETE_NO_ROUTE: u8 = 0x04;

// ============================================================================
// Application Update Status
// ============================================================================

/// A node information frame was received.
pub const UPDATE_STATE_NODE_INFO_RECEIVED: u8 = 0x84;
/// The node information request timed out.
pub const UPDATE_STATE_NODE_INFO_REQ_FAILED: u8 = 0x81;
/// Routing is pending for this node.
pub const UPDATE_STATE_ROUTING_PENDING: u8 = 0x02;
/// A new node id was assigned.
pub const UPDATE_STATE_NEW_ID_ASSIGNED: u8 = 0x40;
/// A node was deleted from the network.
pub const UPDATE_STATE_DELETE_DONE: u8 = 0x20;
/// Sleeping-node update done.
pub const UPDATE_STATE_SUC_ID: u8 = 0x10;

// ============================================================================
// Add/Remove Node Status (inclusion/exclusion callbacks)
// ============================================================================

/// Inclusion/exclusion mode entered, waiting for a node.
pub const NODE_STATUS_LEARN_READY: u8 = 0x01;
/// A node was found.
pub const NODE_STATUS_NODE_FOUND: u8 = 0x02;
/// Adding/removing a slave node.
pub const NODE_STATUS_ADDING_SLAVE: u8 = 0x03;
/// Adding/removing a controller node.
pub const NODE_STATUS_ADDING_CONTROLLER: u8 = 0x04;
/// Protocol part of the operation finished.
pub const NODE_STATUS_PROTOCOL_DONE: u8 = 0x05;
/// Operation completed.
pub const NODE_STATUS_DONE: u8 = 0x06;
/// Operation failed.
pub const NODE_STATUS_FAILED: u8 = 0x07;

/// Start inclusion/exclusion, any node.
pub const NODE_OPTION_ANY: u8 = 0x01;
/// Stop inclusion/exclusion.
pub const NODE_OPTION_STOP: u8 = 0x05;
/// Use network-wide inclusion.
pub const NODE_OPTION_NETWORK_WIDE: u8 = 0x40;

// ============================================================================
// Limits
// ============================================================================

/// Largest SOF frame the decoder will accept (len byte is 8-bit).
pub const MAX_FRAME_SIZE: usize = 257;
/// Number of bytes in the GetInitData node bitmask.
pub const NODE_BITMASK_SIZE: usize = 29;
/// Node id reserved for the controller itself in most installations.
pub const CONTROLLER_NODE_ID: u8 = 0x01;
/// Broadcast destination node id.
pub const BROADCAST_NODE_ID: u8 = 0xFF;
