//! Codec registry and dispatch.

use std::collections::HashMap;

use zwave_model::Node;

use crate::basic;
use crate::encap;
use crate::error::ClassError;
use crate::event::Decoded;
use crate::management;
use crate::sensor;

/// One command-class codec.
///
/// `decode` receives the full application payload
/// (`[classId][commandId][...args]`) with `payload[0]` already matched to
/// `class_id()`. Implementations must bounds-check before reading any field
/// and return `PayloadTooShort` rather than indexing out of range.
pub trait CommandClass: Send + Sync {
    /// The class id byte this codec handles.
    fn class_id(&self) -> u8;

    /// Human-readable class name for logs.
    fn name(&self) -> &'static str;

    /// Decode a received payload into zero or more typed events.
    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError>;
}

/// Class-id → codec table.
///
/// Built once by explicit registration (no runtime type discovery); adding
/// a class means adding a line to [`ClassRegistry::new`]. Unknown class ids
/// dispatch to nothing rather than erroring.
pub struct ClassRegistry {
    codecs: HashMap<u8, Box<dyn CommandClass>>,
}

impl ClassRegistry {
    /// Build the registry with every supported codec.
    pub fn new() -> Self {
        let mut registry = ClassRegistry {
            codecs: HashMap::new(),
        };

        registry.register(Box::new(basic::Basic));
        registry.register(Box::new(basic::SwitchBinary));
        registry.register(Box::new(basic::SwitchMultilevel));
        registry.register(Box::new(basic::SwitchAll));
        registry.register(Box::new(sensor::SensorBinary));
        registry.register(Box::new(sensor::SensorMultilevel));
        registry.register(Box::new(sensor::Meter));
        registry.register(Box::new(sensor::Battery));
        registry.register(Box::new(sensor::Alarm));
        registry.register(Box::new(management::Configuration));
        registry.register(Box::new(management::ManufacturerSpecific));
        registry.register(Box::new(management::Version));
        registry.register(Box::new(management::WakeUp));
        registry.register(Box::new(management::Association));
        registry.register(Box::new(management::UserCode));
        registry.register(Box::new(management::ThermostatSetpoint));
        registry.register(Box::new(management::Clock));
        registry.register(Box::new(management::CentralScene));
        registry.register(Box::new(encap::MultiInstance));
        registry.register(Box::new(encap::MultiCmd));
        registry.register(Box::new(encap::Crc16Encap));

        registry
    }

    fn register(&mut self, codec: Box<dyn CommandClass>) {
        let id = codec.class_id();
        debug_assert!(
            !self.codecs.contains_key(&id),
            "duplicate codec for class 0x{:02X}",
            id
        );
        self.codecs.insert(id, codec);
    }

    /// Look up the codec for a class id.
    pub fn codec(&self, class_id: u8) -> Option<&dyn CommandClass> {
        self.codecs.get(&class_id).map(|c| c.as_ref())
    }

    /// Decode an application payload, absorbing codec errors.
    ///
    /// A malformed payload or unknown class id is logged and yields no
    /// events, and never takes down the receive loop.
    pub fn dispatch(&self, node: &mut Node, payload: &[u8]) -> Vec<Decoded> {
        if payload.len() < 2 {
            log::debug!(
                "node {}: application payload too short ({} bytes)",
                node.id,
                payload.len()
            );
            return Vec::new();
        }

        let class_id = payload[0];
        let Some(codec) = self.codecs.get(&class_id) else {
            log::debug!("node {}: no codec for class 0x{:02X}", node.id, class_id);
            return Vec::new();
        };

        match codec.decode(node, payload, self) {
            Ok(events) => events,
            Err(err) => {
                log::warn!(
                    "node {}: {} decode failed: {}",
                    node.id,
                    codec.name(),
                    err
                );
                Vec::new()
            }
        }
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ClassEvent;
    use crate::ids;

    #[test]
    fn test_unknown_class_yields_no_events() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(2, 0);
        assert!(registry.dispatch(&mut node, &[0xEE, 0x01]).is_empty());
    }

    #[test]
    fn test_short_payload_yields_no_events() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(2, 0);
        assert!(registry.dispatch(&mut node, &[ids::BASIC]).is_empty());
        assert!(registry.dispatch(&mut node, &[]).is_empty());
    }

    #[test]
    fn test_dispatch_basic_report() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(2, 0);
        let events = registry.dispatch(&mut node, &[ids::BASIC, 0x03, 0xFF]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, ClassEvent::BasicReport { value: 0xFF });
    }

    #[test]
    fn test_truncated_report_is_absorbed() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(2, 0);
        // Sensor multilevel report missing its value bytes.
        assert!(registry
            .dispatch(&mut node, &[ids::SENSOR_MULTILEVEL, 0x05])
            .is_empty());
    }
}
