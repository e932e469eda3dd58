//! The node table.
//!
//! Nodes are owned by the registry and addressed by id; callers get scoped
//! `&`/`&mut` access rather than holding shared references to individual
//! nodes. The driver wraps the registry in a single lock.

use std::collections::HashMap;

use crate::node::Node;

/// In-memory table of discovered nodes, keyed by 1-byte node id.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<u8, Node>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        NodeRegistry {
            nodes: HashMap::new(),
        }
    }

    /// Create a node if the id is not yet known; returns whether it was new.
    pub fn create_node(&mut self, id: u8, generic_type: u8) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        log::debug!("registering node {}", id);
        self.nodes.insert(id, Node::new(id, generic_type));
        true
    }

    /// Get a node by id.
    pub fn node(&self, id: u8) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get mutable access to a node by id.
    pub fn node_mut(&mut self, id: u8) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node, returning it if it existed.
    pub fn remove_node(&mut self, id: u8) -> Option<Node> {
        log::debug!("removing node {}", id);
        self.nodes.remove(&id)
    }

    /// All known node ids, sorted.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Populate the table from the GetInitData node bitmask.
    ///
    /// Bit `(id - 1) % 8` of byte `(id - 1) / 8` marks node `id` as present.
    /// The controller's own id is skipped. Returns the ids that were newly
    /// created.
    ///
    /// The length prefix comes off the wire, so masks longer than the 29
    /// bytes covering the 232-node id space are truncated; bits past that
    /// cannot name a valid node and would wrap the id arithmetic.
    pub fn populate_from_bitmask(&mut self, bitmask: &[u8], controller_id: u8) -> Vec<u8> {
        const MAX_BITMASK_BYTES: usize = 29;
        let bitmask = if bitmask.len() > MAX_BITMASK_BYTES {
            log::warn!(
                "node bitmask of {} bytes truncated to {}",
                bitmask.len(),
                MAX_BITMASK_BYTES
            );
            &bitmask[..MAX_BITMASK_BYTES]
        } else {
            bitmask
        };
        let mut created = Vec::new();
        for (byte_idx, byte) in bitmask.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) == 0 {
                    continue;
                }
                let id = (byte_idx * 8 + bit + 1) as u8;
                if id == controller_id {
                    continue;
                }
                if self.create_node(id, 0) {
                    created.push(id);
                }
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_remove() {
        let mut reg = NodeRegistry::new();
        assert!(reg.create_node(2, 0x10));
        assert!(!reg.create_node(2, 0x10));
        assert_eq!(reg.node(2).unwrap().generic_type, 0x10);

        assert!(reg.remove_node(2).is_some());
        assert!(reg.node(2).is_none());
        assert!(reg.remove_node(2).is_none());
    }

    #[test]
    fn test_populate_from_bitmask() {
        let mut reg = NodeRegistry::new();
        // Bits for nodes 1 (controller), 2 and 5.
        let mut mask = [0u8; 29];
        mask[0] = 0b0001_0011;

        let created = reg.populate_from_bitmask(&mask, 1);
        assert_eq!(created, vec![2, 5]);
        assert_eq!(reg.ids(), vec![2, 5]);
    }

    #[test]
    fn test_bitmask_spans_bytes() {
        let mut reg = NodeRegistry::new();
        let mut mask = [0u8; 29];
        mask[1] = 0b0000_0001; // node 9
        mask[3] = 0b1000_0000; // node 32

        let created = reg.populate_from_bitmask(&mask, 1);
        assert_eq!(created, vec![9, 32]);
    }

    #[test]
    fn test_overlong_bitmask_truncated() {
        let mut reg = NodeRegistry::new();
        // Bits past byte 28 would alias low node ids if the mask were
        // walked to its full wire length.
        let mut mask = [0u8; 40];
        mask[0] = 0b0000_0010; // node 2
        mask[28] = 0b1000_0000; // node 232, last valid id
        mask[31] = 0b1000_0000; // would wrap to id 0
        mask[32] = 0b0000_0010; // would alias node 2's bit position

        let created = reg.populate_from_bitmask(&mask, 1);
        assert_eq!(created, vec![2, 232]);
        assert_eq!(reg.ids(), vec![2, 232]);
    }
}
