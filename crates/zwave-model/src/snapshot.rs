//! Persisted snapshot of the node table.
//!
//! The registry is saved to a JSON file on disconnect and restored on
//! connect so that discovery does not start from scratch every session.
//! Byte arrays are stored hex-encoded. Load/save failures are expected
//! conditions (first run, unwritable path) and are surfaced as errors the
//! driver logs and tolerates.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::node::Node;
use crate::registry::NodeRegistry;

/// Serde form of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id.
    pub id: u8,
    /// Basic device type byte.
    pub basic_type: u8,
    /// Generic device type byte.
    pub generic_type: u8,
    /// Specific device type byte.
    pub specific_type: u8,
    /// Node information frame, hex encoded.
    pub node_info: String,
    /// Secured node information frame, hex encoded.
    pub secured_node_info: String,
    /// Per-class negotiated versions.
    #[serde(default)]
    pub versions: HashMap<u8, u8>,
}

/// Serde form of the whole registry plus network identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// The controller's own node id.
    pub controller_id: u8,
    /// Private network key, hex encoded (32 hex chars).
    pub network_key: String,
    /// All known nodes.
    pub nodes: Vec<NodeSnapshot>,
}

impl RegistrySnapshot {
    /// Capture the current registry state.
    pub fn capture(registry: &NodeRegistry, controller_id: u8, network_key: &[u8; 16]) -> Self {
        let mut nodes = Vec::with_capacity(registry.len());
        for id in registry.ids() {
            if let Some(node) = registry.node(id) {
                nodes.push(node_snapshot(node));
            }
        }
        RegistrySnapshot {
            controller_id,
            network_key: hex::encode(network_key),
            nodes,
        }
    }

    /// Rebuild a registry from the snapshot. Returns the registry and the
    /// decoded network key.
    pub fn restore(&self) -> Result<(NodeRegistry, [u8; 16]), ModelError> {
        let key_bytes = hex::decode(&self.network_key).map_err(|source| ModelError::InvalidHex {
            field: "network_key",
            source,
        })?;
        let network_key: [u8; 16] =
            key_bytes
                .try_into()
                .map_err(|v: Vec<u8>| ModelError::InvalidKeyLength {
                    expected: 16,
                    actual: v.len(),
                })?;

        let mut registry = NodeRegistry::new();
        for snap in &self.nodes {
            let node_info = hex::decode(&snap.node_info).map_err(|source| ModelError::InvalidHex {
                field: "node_info",
                source,
            })?;
            let secured_node_info =
                hex::decode(&snap.secured_node_info).map_err(|source| ModelError::InvalidHex {
                    field: "secured_node_info",
                    source,
                })?;

            registry.create_node(snap.id, snap.generic_type);
            if let Some(node) = registry.node_mut(snap.id) {
                node.basic_type = snap.basic_type;
                node.specific_type = snap.specific_type;
                node.node_info = node_info;
                node.secured_node_info = secured_node_info;
                node.versions = snap.versions.clone();
            }
        }
        Ok((registry, network_key))
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the snapshot to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Serde form of one live node.
pub fn node_snapshot(node: &Node) -> NodeSnapshot {
    NodeSnapshot {
        id: node.id,
        basic_type: node.basic_type,
        generic_type: node.generic_type,
        specific_type: node.specific_type,
        node_info: hex::encode(&node.node_info),
        secured_node_info: hex::encode(&node.secured_node_info),
        versions: node.versions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_restore_roundtrip() {
        let mut reg = NodeRegistry::new();
        reg.create_node(2, 0x10);
        {
            let node = reg.node_mut(2).unwrap();
            node.basic_type = 0x04;
            node.update_node_info(&[0x20, 0x25]);
            node.update_secured_node_info(&[0x62]);
            node.set_class_version(0x25, 2);
        }

        let key = [0xAB; 16];
        let snap = RegistrySnapshot::capture(&reg, 1, &key);
        let json = serde_json::to_string(&snap).unwrap();
        let snap2: RegistrySnapshot = serde_json::from_str(&json).unwrap();

        let (restored, restored_key) = snap2.restore().unwrap();
        assert_eq!(restored_key, key);
        let node = restored.node(2).unwrap();
        assert_eq!(node.basic_type, 0x04);
        assert_eq!(node.node_info, vec![0x20, 0x25]);
        assert_eq!(node.secured_node_info, vec![0x62]);
        assert_eq!(node.class_version(0x25), 2);
    }

    #[test]
    fn test_restore_rejects_bad_key() {
        let snap = RegistrySnapshot {
            controller_id: 1,
            network_key: "abcd".to_string(),
            nodes: Vec::new(),
        };
        assert!(matches!(
            snap.restore(),
            Err(ModelError::InvalidKeyLength { .. })
        ));
    }
}
