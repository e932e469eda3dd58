//! Encapsulating command classes.
//!
//! These codecs carry other classes' payloads and recurse through the
//! registry to decode them: MultiInstance/MultiChannel tags events with the
//! originating endpoint, MultiCmd batches several commands in one frame,
//! and Crc16Encap adds an end-to-end CRC for nodes on noisy links.

use crc::{Crc, CRC_16_SPI_FUJITSU};
use zwave_model::Node;

use crate::error::{require_len, ClassError};
use crate::event::{ClassEvent, Decoded};
use crate::ids;
use crate::registry::{ClassRegistry, CommandClass};

/// CRC-16/AUG-CCITT (poly 0x1021, init 0x1D0F) used by Crc16Encap.
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_SPI_FUJITSU);

// ============================================================================
// MultiInstance / MultiChannel (0x60)
// ============================================================================

const INSTANCE_CMD_ENCAP: u8 = 0x06;
const CHANNEL_CMD_ENCAP: u8 = 0x0D;

/// Multi-instance (v1) and multi-channel (v2) encapsulation codec.
pub struct MultiInstance;

impl MultiInstance {
    /// Wrap a payload for a v1 instance.
    pub fn encapsulate(instance: u8, inner: &[u8]) -> Vec<u8> {
        let mut payload = vec![ids::MULTI_INSTANCE, INSTANCE_CMD_ENCAP, instance];
        payload.extend_from_slice(inner);
        payload
    }

    /// Wrap a payload for a v2 endpoint (source endpoint 1 = controller).
    pub fn encapsulate_channel(endpoint: u8, inner: &[u8]) -> Vec<u8> {
        let mut payload = vec![ids::MULTI_INSTANCE, CHANNEL_CMD_ENCAP, 0x01, endpoint];
        payload.extend_from_slice(inner);
        payload
    }

    /// Classes that get the extra multi-instance flavored event.
    fn flavored(class: u8) -> bool {
        matches!(
            class,
            ids::SWITCH_BINARY
                | ids::SWITCH_MULTILEVEL
                | ids::SENSOR_BINARY
                | ids::SENSOR_MULTILEVEL
        )
    }

    fn decode_inner(
        node: &mut Node,
        instance: u8,
        inner: &[u8],
        classes: &ClassRegistry,
    ) -> Vec<Decoded> {
        let mut events = Vec::new();
        for decoded in classes.dispatch(node, inner) {
            let event = decoded.event;
            if Self::flavored(inner[0]) {
                events.push(Decoded {
                    instance,
                    event: ClassEvent::MultiInstanceReport {
                        class: inner[0],
                        inner: Box::new(event.clone()),
                    },
                });
            }
            events.push(Decoded { instance, event });
        }
        events
    }
}

impl CommandClass for MultiInstance {
    fn class_id(&self) -> u8 {
        ids::MULTI_INSTANCE
    }

    fn name(&self) -> &'static str {
        "MultiInstance"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::MULTI_INSTANCE, payload, 5)?;
        match payload[1] {
            INSTANCE_CMD_ENCAP => {
                // [2]=instance, inner payload follows
                Ok(Self::decode_inner(node, payload[2], &payload[3..], classes))
            }
            CHANNEL_CMD_ENCAP => {
                require_len(ids::MULTI_INSTANCE, payload, 6)?;
                // [2]=source endpoint, [3]=destination endpoint
                Ok(Self::decode_inner(node, payload[2], &payload[4..], classes))
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// MultiCmd (0x8F)
// ============================================================================

const MULTI_CMD_ENCAP: u8 = 0x01;

/// Multi-command batching codec.
pub struct MultiCmd;

impl MultiCmd {
    /// Batch several payloads into one frame.
    pub fn encapsulate(commands: &[&[u8]]) -> Vec<u8> {
        let mut payload = vec![ids::MULTI_CMD, MULTI_CMD_ENCAP, commands.len() as u8];
        for cmd in commands {
            payload.push(cmd.len() as u8);
            payload.extend_from_slice(cmd);
        }
        payload
    }
}

impl CommandClass for MultiCmd {
    fn class_id(&self) -> u8 {
        ids::MULTI_CMD
    }

    fn name(&self) -> &'static str {
        "MultiCmd"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::MULTI_CMD, payload, 3)?;
        if payload[1] != MULTI_CMD_ENCAP {
            return Ok(Vec::new());
        }

        // [2]=command count, then length-prefixed sub-blocks. Events chain
        // in wire order; a truncated block ends iteration without dropping
        // what already decoded.
        let mut events = Vec::new();
        let mut offset = 3;
        let count = payload[2];
        for _ in 0..count {
            if offset >= payload.len() {
                break;
            }
            let len = payload[offset] as usize;
            let start = offset + 1;
            let end = start + len;
            if len == 0 || end > payload.len() {
                log::debug!("node {}: truncated MultiCmd block at {}", node.id, offset);
                break;
            }
            events.extend(classes.dispatch(node, &payload[start..end]));
            offset = end;
        }
        Ok(events)
    }
}

// ============================================================================
// Crc16Encap (0x56)
// ============================================================================

const CRC16_ENCAP_CMD: u8 = 0x01;

/// CRC16 encapsulation codec.
pub struct Crc16Encap;

impl Crc16Encap {
    /// Wrap a payload with the trailing CRC.
    pub fn encapsulate(inner: &[u8]) -> Vec<u8> {
        let mut payload = vec![ids::CRC16_ENCAP, CRC16_ENCAP_CMD];
        payload.extend_from_slice(inner);
        let crc = CRC16.checksum(&payload);
        payload.extend_from_slice(&crc.to_be_bytes());
        payload
    }
}

impl CommandClass for Crc16Encap {
    fn class_id(&self) -> u8 {
        ids::CRC16_ENCAP
    }

    fn name(&self) -> &'static str {
        "Crc16Encap"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        // class + cmd + at least [innerClass, innerCmd] + 2-byte CRC
        require_len(ids::CRC16_ENCAP, payload, 6)?;
        if payload[1] != CRC16_ENCAP_CMD {
            return Ok(Vec::new());
        }

        let crc_offset = payload.len() - 2;
        let actual = u16::from_be_bytes([payload[crc_offset], payload[crc_offset + 1]]);
        let expected = CRC16.checksum(&payload[..crc_offset]);
        if expected != actual {
            // Logged and dropped, never escalated.
            return Err(ClassError::CrcMismatch { expected, actual });
        }

        Ok(classes.dispatch(node, &payload[2..crc_offset]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::SwitchBinary;

    #[test]
    fn test_crc16_known_vector() {
        // CRC-16/AUG-CCITT check value for "123456789".
        assert_eq!(CRC16.checksum(b"123456789"), 0xE5CC);
        // Empty input yields the init value.
        assert_eq!(CRC16.checksum(&[]), 0x1D0F);
    }

    #[test]
    fn test_crc16_roundtrip() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        let payload = Crc16Encap::encapsulate(&SwitchBinary::set(true));

        let events = Crc16Encap.decode(&mut node, &payload, &registry).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, ClassEvent::SwitchBinaryReport { on: true });
    }

    #[test]
    fn test_crc16_bit_flip_detected() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        let good = Crc16Encap::encapsulate(&SwitchBinary::set(true));

        for bit in 0..8 {
            let mut bad = good.clone();
            bad[3] ^= 1 << bit;
            let err = Crc16Encap.decode(&mut node, &bad, &registry).unwrap_err();
            assert!(matches!(err, ClassError::CrcMismatch { .. }));
        }
    }

    #[test]
    fn test_multi_instance_tags_and_flavors() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        // Instance 2, switch binary report ON.
        let payload = MultiInstance::encapsulate(2, &[ids::SWITCH_BINARY, 0x03, 0xFF]);

        let events = MultiInstance.decode(&mut node, &payload, &registry).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].instance, 2);
        assert_eq!(
            events[0].event,
            ClassEvent::MultiInstanceReport {
                class: ids::SWITCH_BINARY,
                inner: Box::new(ClassEvent::SwitchBinaryReport { on: true }),
            }
        );
        assert_eq!(events[1].event, ClassEvent::SwitchBinaryReport { on: true });
    }

    #[test]
    fn test_multi_channel_uses_source_endpoint() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        // Source endpoint 3 → destination 1 (controller).
        let payload = vec![
            ids::MULTI_INSTANCE,
            CHANNEL_CMD_ENCAP,
            0x03,
            0x01,
            ids::BASIC,
            0x03,
            0x00,
        ];
        let events = MultiInstance.decode(&mut node, &payload, &registry).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].instance, 3);
        assert_eq!(events[0].event, ClassEvent::BasicReport { value: 0 });
    }

    #[test]
    fn test_multi_cmd_chains_in_order() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        let payload = MultiCmd::encapsulate(&[
            &[ids::BASIC, 0x03, 0x10],
            &[ids::BATTERY, 0x03, 0x55],
        ]);

        let events = MultiCmd.decode(&mut node, &payload, &registry).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, ClassEvent::BasicReport { value: 0x10 });
        assert_eq!(events[1].event, ClassEvent::BatteryReport { level: 0x55 });
    }

    #[test]
    fn test_multi_cmd_truncated_block_keeps_earlier_events() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(9, 0);
        // Second block claims 9 bytes but only 2 follow.
        let mut payload = vec![ids::MULTI_CMD, MULTI_CMD_ENCAP, 2];
        payload.extend_from_slice(&[3, ids::BASIC, 0x03, 0x10]);
        payload.extend_from_slice(&[9, ids::BATTERY, 0x03]);

        let events = MultiCmd.decode(&mut node, &payload, &registry).unwrap();
        assert_eq!(events.len(), 1);
    }
}
