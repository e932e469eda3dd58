//! A single mesh node and its negotiated capabilities.

use std::collections::HashMap;

use crate::data::DataBag;

/// Manufacturer identity triple reported by the ManufacturerSpecific class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerInfo {
    /// Manufacturer id.
    pub manufacturer_id: u16,
    /// Product type id.
    pub type_id: u16,
    /// Product id.
    pub product_id: u16,
}

/// Firmware/library version record reported by the Version class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Z-Wave library type.
    pub library: u8,
    /// Protocol version (major, minor).
    pub protocol: (u8, u8),
    /// Application version (major, minor).
    pub application: (u8, u8),
}

/// One remote mesh device, addressed by a 1-byte id.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node id (1..255; 1 is typically the controller).
    pub id: u8,
    /// Basic device type byte.
    pub basic_type: u8,
    /// Generic device type byte.
    pub generic_type: u8,
    /// Specific device type byte.
    pub specific_type: u8,
    /// Node information frame: command-class ids advertised unencrypted,
    /// in the order the node listed them.
    pub node_info: Vec<u8>,
    /// Command-class ids the node requires encryption for.
    pub secured_node_info: Vec<u8>,
    /// Negotiated version per command class.
    pub versions: HashMap<u8, u8>,
    /// Manufacturer identity, once queried.
    pub manufacturer: Option<ManufacturerInfo>,
    /// Firmware version record, once queried.
    pub version_info: Option<VersionInfo>,
    /// Typed per-node protocol state stashed by command classes.
    pub data: DataBag,
}

impl Node {
    /// Create a node with nothing negotiated yet.
    pub fn new(id: u8, generic_type: u8) -> Self {
        Node {
            id,
            basic_type: 0,
            generic_type,
            specific_type: 0,
            node_info: Vec::new(),
            secured_node_info: Vec::new(),
            versions: HashMap::new(),
            manufacturer: None,
            version_info: None,
            data: DataBag::new(),
        }
    }

    /// Whether the node advertised this command class unencrypted.
    pub fn supports_command_class(&self, class_id: u8) -> bool {
        self.node_info.contains(&class_id)
    }

    /// Whether this command class must be sent encrypted to the node.
    pub fn is_secured_command_class(&self, class_id: u8) -> bool {
        self.secured_node_info.contains(&class_id)
    }

    /// Negotiated version for a command class; unknown classes default to 1.
    pub fn class_version(&self, class_id: u8) -> u8 {
        self.versions.get(&class_id).copied().unwrap_or(1)
    }

    /// Record a negotiated command-class version.
    pub fn set_class_version(&mut self, class_id: u8, version: u8) {
        self.versions.insert(class_id, version);
    }

    /// Replace the node information frame and rebuild the class table.
    ///
    /// The rebuild is skipped when the new frame has the same length as the
    /// current one, so a same-length but different-content frame (e.g. after
    /// re-inclusion) will not refresh the table. Callers that must force a
    /// refresh clear `node_info` first.
    pub fn update_node_info(&mut self, node_info: &[u8]) {
        if self.node_info.len() == node_info.len() {
            log::debug!(
                "node {}: node info length unchanged ({}), skipping class table rebuild",
                self.id,
                node_info.len()
            );
            return;
        }
        self.node_info = node_info.to_vec();
        let current = self.node_info.clone();
        self.versions.retain(|class, _| current.contains(class));
    }

    /// Replace the secured node information frame.
    pub fn update_secured_node_info(&mut self, classes: &[u8]) {
        self.secured_node_info = classes.to_vec();
    }
}
