//! Basic and switch command classes.

use zwave_model::Node;

use crate::error::{require_len, ClassError};
use crate::event::{ClassEvent, Decoded};
use crate::ids;
use crate::registry::{ClassRegistry, CommandClass};

// Shared get/set/report command ids for the simple classes.
const CMD_SET: u8 = 0x01;
const CMD_GET: u8 = 0x02;
const CMD_REPORT: u8 = 0x03;

// SwitchMultilevel extras.
const CMD_START_LEVEL_CHANGE: u8 = 0x04;
const CMD_STOP_LEVEL_CHANGE: u8 = 0x05;

// ============================================================================
// Basic (0x20)
// ============================================================================

/// Basic get/set/report codec.
pub struct Basic;

impl Basic {
    /// Build a Basic Set payload.
    pub fn set(value: u8) -> Vec<u8> {
        vec![ids::BASIC, CMD_SET, value]
    }

    /// Build a Basic Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::BASIC, CMD_GET]
    }
}

impl CommandClass for Basic {
    fn class_id(&self) -> u8 {
        ids::BASIC
    }

    fn name(&self) -> &'static str {
        "Basic"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::BASIC, payload, 3)?;
        match payload[1] {
            CMD_REPORT => Ok(vec![Decoded::root(ClassEvent::BasicReport {
                value: payload[2],
            })]),
            CMD_SET => Ok(vec![Decoded::root(ClassEvent::BasicSet {
                value: payload[2],
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// SwitchBinary (0x25)
// ============================================================================

/// Binary switch codec.
pub struct SwitchBinary;

impl SwitchBinary {
    /// Build a Set payload (0x00 off, 0xFF on).
    pub fn set(on: bool) -> Vec<u8> {
        vec![ids::SWITCH_BINARY, CMD_SET, if on { 0xFF } else { 0x00 }]
    }

    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::SWITCH_BINARY, CMD_GET]
    }
}

impl CommandClass for SwitchBinary {
    fn class_id(&self) -> u8 {
        ids::SWITCH_BINARY
    }

    fn name(&self) -> &'static str {
        "SwitchBinary"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::SWITCH_BINARY, payload, 3)?;
        match payload[1] {
            CMD_REPORT | CMD_SET => Ok(vec![Decoded::root(ClassEvent::SwitchBinaryReport {
                on: payload[2] != 0,
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// SwitchMultilevel (0x26)
// ============================================================================

/// Multilevel switch (dimmer) codec.
pub struct SwitchMultilevel;

impl SwitchMultilevel {
    /// Build a Set payload with a level 0-99 (0xFF = restore last level).
    pub fn set(level: u8) -> Vec<u8> {
        vec![ids::SWITCH_MULTILEVEL, CMD_SET, level]
    }

    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::SWITCH_MULTILEVEL, CMD_GET]
    }

    /// Build a StartLevelChange payload (direction bit 6: 0 up, 1 down).
    pub fn start_level_change(up: bool, start_level: u8) -> Vec<u8> {
        let direction = if up { 0x00 } else { 0x40 };
        vec![
            ids::SWITCH_MULTILEVEL,
            CMD_START_LEVEL_CHANGE,
            direction,
            start_level,
        ]
    }

    /// Build a StopLevelChange payload.
    pub fn stop_level_change() -> Vec<u8> {
        vec![ids::SWITCH_MULTILEVEL, CMD_STOP_LEVEL_CHANGE]
    }
}

impl CommandClass for SwitchMultilevel {
    fn class_id(&self) -> u8 {
        ids::SWITCH_MULTILEVEL
    }

    fn name(&self) -> &'static str {
        "SwitchMultilevel"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::SWITCH_MULTILEVEL, payload, 3)?;
        match payload[1] {
            CMD_REPORT | CMD_SET => Ok(vec![Decoded::root(
                ClassEvent::SwitchMultilevelReport { level: payload[2] },
            )]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// SwitchAll (0x27)
// ============================================================================

/// All-switch participation codec.
pub struct SwitchAll;

impl SwitchAll {
    /// Build a Set payload for the all-on/all-off participation mode.
    pub fn set(mode: u8) -> Vec<u8> {
        vec![ids::SWITCH_ALL, CMD_SET, mode]
    }

    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::SWITCH_ALL, CMD_GET]
    }
}

impl CommandClass for SwitchAll {
    fn class_id(&self) -> u8 {
        ids::SWITCH_ALL
    }

    fn name(&self) -> &'static str {
        "SwitchAll"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::SWITCH_ALL, payload, 3)?;
        match payload[1] {
            CMD_REPORT => Ok(vec![Decoded::root(ClassEvent::SwitchAllReport {
                mode: payload[2],
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_report() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(3, 0);
        let events = Basic
            .decode(&mut node, &[ids::BASIC, CMD_REPORT, 0x63], &registry)
            .unwrap();
        assert_eq!(events[0].event, ClassEvent::BasicReport { value: 0x63 });
    }

    #[test]
    fn test_basic_set_produces_distinct_event() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(3, 0);
        let events = Basic
            .decode(&mut node, &[ids::BASIC, CMD_SET, 0x00], &registry)
            .unwrap();
        assert_eq!(events[0].event, ClassEvent::BasicSet { value: 0 });
    }

    #[test]
    fn test_switch_binary_builders() {
        assert_eq!(SwitchBinary::set(true), vec![0x25, 0x01, 0xFF]);
        assert_eq!(SwitchBinary::set(false), vec![0x25, 0x01, 0x00]);
        assert_eq!(SwitchBinary::get(), vec![0x25, 0x02]);
    }

    #[test]
    fn test_short_payload_rejected() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(3, 0);
        let err = SwitchBinary
            .decode(&mut node, &[ids::SWITCH_BINARY, CMD_REPORT], &registry)
            .unwrap_err();
        assert!(matches!(err, ClassError::PayloadTooShort { .. }));
    }

    #[test]
    fn test_start_level_change_direction() {
        assert_eq!(
            SwitchMultilevel::start_level_change(false, 0x20),
            vec![0x26, 0x04, 0x40, 0x20]
        );
    }
}
