//! Sensor, meter, battery, and alarm command classes.

use zwave_model::Node;

use crate::error::{require_len, ClassError};
use crate::event::{ClassEvent, Decoded};
use crate::ids;
use crate::registry::{ClassRegistry, CommandClass};
use crate::value;

// ============================================================================
// SensorBinary (0x30)
// ============================================================================

const SENSOR_BINARY_GET: u8 = 0x02;
const SENSOR_BINARY_REPORT: u8 = 0x03;

/// Binary sensor codec.
pub struct SensorBinary;

impl SensorBinary {
    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::SENSOR_BINARY, SENSOR_BINARY_GET]
    }
}

impl CommandClass for SensorBinary {
    fn class_id(&self) -> u8 {
        ids::SENSOR_BINARY
    }

    fn name(&self) -> &'static str {
        "SensorBinary"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::SENSOR_BINARY, payload, 3)?;
        match payload[1] {
            SENSOR_BINARY_REPORT => Ok(vec![Decoded::root(ClassEvent::SensorBinaryReport {
                triggered: payload[2] != 0,
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// SensorMultilevel (0x31)
// ============================================================================

const SENSOR_MULTILEVEL_GET: u8 = 0x04;
const SENSOR_MULTILEVEL_REPORT: u8 = 0x05;

/// Multilevel sensor codec with scaled-value readings.
pub struct SensorMultilevel;

impl SensorMultilevel {
    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::SENSOR_MULTILEVEL, SENSOR_MULTILEVEL_GET]
    }
}

impl CommandClass for SensorMultilevel {
    fn class_id(&self) -> u8 {
        ids::SENSOR_MULTILEVEL
    }

    fn name(&self) -> &'static str {
        "SensorMultilevel"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::SENSOR_MULTILEVEL, payload, 4)?;
        match payload[1] {
            SENSOR_MULTILEVEL_REPORT => {
                let reading = value::decode_at(payload, 3, ids::SENSOR_MULTILEVEL)?;
                Ok(vec![Decoded::root(ClassEvent::SensorMultilevelReport {
                    sensor_type: payload[2],
                    value: reading,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Meter (0x32)
// ============================================================================

const METER_GET: u8 = 0x01;
const METER_REPORT: u8 = 0x02;

/// Consumption meter codec.
pub struct Meter;

impl Meter {
    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::METER, METER_GET]
    }
}

impl CommandClass for Meter {
    fn class_id(&self) -> u8 {
        ids::METER
    }

    fn name(&self) -> &'static str {
        "Meter"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::METER, payload, 4)?;
        match payload[1] {
            METER_REPORT => {
                let reading = value::decode_at(payload, 3, ids::METER)?;
                Ok(vec![Decoded::root(ClassEvent::MeterReport {
                    // Low 5 bits; the high bits carry rate direction on v2+.
                    meter_type: payload[2] & 0x1F,
                    value: reading,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Battery (0x80)
// ============================================================================

const BATTERY_GET: u8 = 0x02;
const BATTERY_REPORT: u8 = 0x03;

/// Battery level codec.
pub struct Battery;

impl Battery {
    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::BATTERY, BATTERY_GET]
    }
}

impl CommandClass for Battery {
    fn class_id(&self) -> u8 {
        ids::BATTERY
    }

    fn name(&self) -> &'static str {
        "Battery"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::BATTERY, payload, 3)?;
        match payload[1] {
            BATTERY_REPORT => Ok(vec![Decoded::root(ClassEvent::BatteryReport {
                level: payload[2],
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Alarm (0x71)
// ============================================================================

const ALARM_GET: u8 = 0x04;
const ALARM_REPORT: u8 = 0x05;

/// Alarm / notification codec.
pub struct Alarm;

impl Alarm {
    /// Build a Get payload for an alarm type.
    pub fn get(alarm_type: u8) -> Vec<u8> {
        vec![ids::ALARM, ALARM_GET, alarm_type]
    }
}

impl CommandClass for Alarm {
    fn class_id(&self) -> u8 {
        ids::ALARM
    }

    fn name(&self) -> &'static str {
        "Alarm"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        // Short alarm frames from noisy nodes are real.
        require_len(ids::ALARM, payload, 4)?;
        match payload[1] {
            ALARM_REPORT => Ok(vec![Decoded::root(ClassEvent::AlarmReport {
                alarm_type: payload[2],
                level: payload[3],
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_multilevel_temperature() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(4, 0);
        // type 1 (temperature), precision 1, scale 0, size 2, value 21.5
        let mut payload = vec![ids::SENSOR_MULTILEVEL, SENSOR_MULTILEVEL_REPORT, 0x01];
        payload.extend_from_slice(&value::encode(21.5, 0).unwrap());

        let events = SensorMultilevel
            .decode(&mut node, &payload, &registry)
            .unwrap();
        match &events[0].event {
            ClassEvent::SensorMultilevelReport { sensor_type, value } => {
                assert_eq!(*sensor_type, 1);
                assert_eq!(value.value, 21.5);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_meter_masks_type_bits() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(4, 0);
        let mut payload = vec![ids::METER, METER_REPORT, 0xA1];
        payload.extend_from_slice(&value::encode(3.25, 0).unwrap());

        let events = Meter.decode(&mut node, &payload, &registry).unwrap();
        match &events[0].event {
            ClassEvent::MeterReport { meter_type, value } => {
                assert_eq!(*meter_type, 0x01);
                assert_eq!(value.value, 3.25);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_alarm_short_payload_rejected() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(4, 0);
        let err = Alarm
            .decode(&mut node, &[ids::ALARM, ALARM_REPORT, 0x07], &registry)
            .unwrap_err();
        assert!(matches!(err, ClassError::PayloadTooShort { .. }));
    }

    #[test]
    fn test_battery_low_warning() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(4, 0);
        let events = Battery
            .decode(&mut node, &[ids::BATTERY, BATTERY_REPORT, 0xFF], &registry)
            .unwrap();
        assert_eq!(events[0].event, ClassEvent::BatteryReport { level: 0xFF });
    }
}
