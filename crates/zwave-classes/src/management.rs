//! Configuration, identity, and housekeeping command classes.
//!
//! Several of these codecs stash negotiated per-node parameters in the
//! node's data bag so later encodes can mirror what the device reported
//! (configuration value widths, setpoint number formats, wake-up state).

use zwave_model::{DataValue, Node};

use crate::error::{require_len, ClassError};
use crate::event::{ClassEvent, Decoded};
use crate::ids;
use crate::registry::{ClassRegistry, CommandClass};
use crate::value;

// ============================================================================
// Configuration (0x70)
// ============================================================================

const CONFIG_SET: u8 = 0x04;
const CONFIG_GET: u8 = 0x05;
const CONFIG_REPORT: u8 = 0x06;

/// Device configuration parameter codec.
pub struct Configuration;

impl Configuration {
    /// Data bag key prefix for learned parameter widths.
    fn size_key(parameter: u8) -> String {
        format!("config_param_{}_size", parameter)
    }

    /// Build a Get payload for a parameter.
    pub fn get(parameter: u8) -> Vec<u8> {
        vec![ids::CONFIGURATION, CONFIG_GET, parameter]
    }

    /// Build a Set payload.
    ///
    /// The value width defaults to the width the device last reported for
    /// this parameter (1 byte when the parameter was never read).
    pub fn set(node: &Node, parameter: u8, val: i64) -> Vec<u8> {
        let size = node
            .data
            .get_byte(&Self::size_key(parameter))
            .filter(|s| matches!(s, 1 | 2 | 4))
            .unwrap_or(1);

        let mut payload = vec![ids::CONFIGURATION, CONFIG_SET, parameter, size];
        match size {
            1 => payload.push(val as u8),
            2 => payload.extend_from_slice(&(val as i16).to_be_bytes()),
            _ => payload.extend_from_slice(&(val as i32).to_be_bytes()),
        }
        payload
    }
}

impl CommandClass for Configuration {
    fn class_id(&self) -> u8 {
        ids::CONFIGURATION
    }

    fn name(&self) -> &'static str {
        "Configuration"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::CONFIGURATION, payload, 5)?;
        match payload[1] {
            CONFIG_REPORT => {
                let parameter = payload[2];
                let size = payload[3] & 0x07;
                require_len(ids::CONFIGURATION, payload, 4 + size as usize)?;

                // Remember the width so a later Set mirrors it.
                node.data
                    .set(&Self::size_key(parameter), DataValue::Byte(size));

                let val = value::int_from_bytes(&payload[4..4 + size as usize]);
                Ok(vec![Decoded::root(ClassEvent::ConfigurationReport {
                    parameter,
                    value: val,
                    size,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// ManufacturerSpecific (0x72)
// ============================================================================

const MANUFACTURER_GET: u8 = 0x04;
const MANUFACTURER_REPORT: u8 = 0x05;

/// Manufacturer identity codec.
pub struct ManufacturerSpecific;

impl ManufacturerSpecific {
    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::MANUFACTURER_SPECIFIC, MANUFACTURER_GET]
    }
}

impl CommandClass for ManufacturerSpecific {
    fn class_id(&self) -> u8 {
        ids::MANUFACTURER_SPECIFIC
    }

    fn name(&self) -> &'static str {
        "ManufacturerSpecific"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::MANUFACTURER_SPECIFIC, payload, 8)?;
        match payload[1] {
            MANUFACTURER_REPORT => {
                let manufacturer_id = u16::from_be_bytes([payload[2], payload[3]]);
                let type_id = u16::from_be_bytes([payload[4], payload[5]]);
                let product_id = u16::from_be_bytes([payload[6], payload[7]]);

                node.manufacturer = Some(zwave_model::ManufacturerInfo {
                    manufacturer_id,
                    type_id,
                    product_id,
                });

                Ok(vec![Decoded::root(ClassEvent::ManufacturerReport {
                    manufacturer_id,
                    type_id,
                    product_id,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Version (0x86)
// ============================================================================

const VERSION_GET: u8 = 0x11;
const VERSION_REPORT: u8 = 0x12;
const VERSION_CLASS_GET: u8 = 0x13;
const VERSION_CLASS_REPORT: u8 = 0x14;

/// Version negotiation codec.
pub struct Version;

impl Version {
    /// Build a Get payload for the firmware version record.
    pub fn get() -> Vec<u8> {
        vec![ids::VERSION, VERSION_GET]
    }

    /// Build a per-class version query.
    pub fn get_command_class(class: u8) -> Vec<u8> {
        vec![ids::VERSION, VERSION_CLASS_GET, class]
    }
}

impl CommandClass for Version {
    fn class_id(&self) -> u8 {
        ids::VERSION
    }

    fn name(&self) -> &'static str {
        "Version"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::VERSION, payload, 4)?;
        match payload[1] {
            VERSION_REPORT => {
                require_len(ids::VERSION, payload, 7)?;
                let info = zwave_model::VersionInfo {
                    library: payload[2],
                    protocol: (payload[3], payload[4]),
                    application: (payload[5], payload[6]),
                };
                node.version_info = Some(info);
                Ok(vec![Decoded::root(ClassEvent::VersionReport {
                    library: info.library,
                    protocol: info.protocol,
                    application: info.application,
                })])
            }
            VERSION_CLASS_REPORT => {
                let class = payload[2];
                let version = payload[3];
                node.set_class_version(class, version);
                Ok(vec![Decoded::root(ClassEvent::CommandClassVersionReport {
                    class,
                    version,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// WakeUp (0x84)
// ============================================================================

const WAKEUP_INTERVAL_SET: u8 = 0x04;
const WAKEUP_INTERVAL_GET: u8 = 0x05;
const WAKEUP_INTERVAL_REPORT: u8 = 0x06;
const WAKEUP_NOTIFICATION: u8 = 0x07;
const WAKEUP_NO_MORE_INFORMATION: u8 = 0x08;

/// Wake-up handling for battery-powered sleeping devices.
pub struct WakeUp;

impl WakeUp {
    /// Data bag flag: node is currently asleep.
    pub const SLEEPING_KEY: &'static str = "wakeup_sleeping";
    /// Data bag flag: node is mains-powered despite supporting wake-up.
    pub const ALWAYS_AWAKE_KEY: &'static str = "wakeup_always_awake";

    /// Build an interval Set payload (24-bit seconds, notification target).
    pub fn set_interval(seconds: u32, target_node: u8) -> Vec<u8> {
        let bytes = seconds.to_be_bytes();
        vec![
            ids::WAKE_UP,
            WAKEUP_INTERVAL_SET,
            bytes[1],
            bytes[2],
            bytes[3],
            target_node,
        ]
    }

    /// Build an interval Get payload.
    pub fn get_interval() -> Vec<u8> {
        vec![ids::WAKE_UP, WAKEUP_INTERVAL_GET]
    }

    /// Tell the node it may go back to sleep.
    pub fn no_more_information() -> Vec<u8> {
        vec![ids::WAKE_UP, WAKEUP_NO_MORE_INFORMATION]
    }

    /// Whether the node is flagged asleep.
    pub fn is_sleeping(node: &Node) -> bool {
        node.data.get_flag(Self::SLEEPING_KEY) && !node.data.get_flag(Self::ALWAYS_AWAKE_KEY)
    }

    /// Flag the node asleep or awake.
    pub fn set_sleeping(node: &mut Node, sleeping: bool) {
        node.data.set(Self::SLEEPING_KEY, DataValue::Bool(sleeping));
    }
}

impl CommandClass for WakeUp {
    fn class_id(&self) -> u8 {
        ids::WAKE_UP
    }

    fn name(&self) -> &'static str {
        "WakeUp"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::WAKE_UP, payload, 2)?;
        match payload[1] {
            WAKEUP_NOTIFICATION => {
                WakeUp::set_sleeping(node, false);
                Ok(vec![Decoded::root(ClassEvent::WakeUpNotification)])
            }
            WAKEUP_INTERVAL_REPORT => {
                require_len(ids::WAKE_UP, payload, 6)?;
                let seconds =
                    u32::from_be_bytes([0, payload[2], payload[3], payload[4]]);
                node.data.set("wakeup_interval", DataValue::U32(seconds));
                Ok(vec![Decoded::root(ClassEvent::WakeUpIntervalReport {
                    seconds,
                    target_node: payload[5],
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Association (0x85)
// ============================================================================

const ASSOCIATION_SET: u8 = 0x01;
const ASSOCIATION_GET: u8 = 0x02;
const ASSOCIATION_REPORT: u8 = 0x03;
const ASSOCIATION_REMOVE: u8 = 0x04;
const ASSOCIATION_GROUPINGS_GET: u8 = 0x05;
const ASSOCIATION_GROUPINGS_REPORT: u8 = 0x06;

/// Association group codec.
pub struct Association;

impl Association {
    /// Build a Set payload adding a node to a group.
    pub fn set(group: u8, node_id: u8) -> Vec<u8> {
        vec![ids::ASSOCIATION, ASSOCIATION_SET, group, node_id]
    }

    /// Build a Get payload for a group's members.
    pub fn get(group: u8) -> Vec<u8> {
        vec![ids::ASSOCIATION, ASSOCIATION_GET, group]
    }

    /// Build a Remove payload.
    pub fn remove(group: u8, node_id: u8) -> Vec<u8> {
        vec![ids::ASSOCIATION, ASSOCIATION_REMOVE, group, node_id]
    }

    /// Build a groupings-count query.
    pub fn get_groupings() -> Vec<u8> {
        vec![ids::ASSOCIATION, ASSOCIATION_GROUPINGS_GET]
    }
}

impl CommandClass for Association {
    fn class_id(&self) -> u8 {
        ids::ASSOCIATION
    }

    fn name(&self) -> &'static str {
        "Association"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::ASSOCIATION, payload, 3)?;
        match payload[1] {
            ASSOCIATION_REPORT => {
                require_len(ids::ASSOCIATION, payload, 5)?;
                Ok(vec![Decoded::root(ClassEvent::AssociationReport {
                    group: payload[2],
                    max_nodes: payload[3],
                    // payload[4] is reports-to-follow; members trail it.
                    nodes: payload[5..].to_vec(),
                })])
            }
            ASSOCIATION_GROUPINGS_REPORT => {
                Ok(vec![Decoded::root(ClassEvent::AssociationGroupingsReport {
                    groups: payload[2],
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// UserCode (0x63)
// ============================================================================

const USER_CODE_SET: u8 = 0x01;
const USER_CODE_GET: u8 = 0x02;
const USER_CODE_REPORT: u8 = 0x03;

/// User code (lock/keypad) codec.
pub struct UserCode;

impl UserCode {
    /// Build a Set payload for a code slot.
    pub fn set(slot: u8, status: u8, code: &[u8]) -> Vec<u8> {
        let mut payload = vec![ids::USER_CODE, USER_CODE_SET, slot, status];
        payload.extend_from_slice(code);
        payload
    }

    /// Build a Get payload for a code slot.
    pub fn get(slot: u8) -> Vec<u8> {
        vec![ids::USER_CODE, USER_CODE_GET, slot]
    }
}

impl CommandClass for UserCode {
    fn class_id(&self) -> u8 {
        ids::USER_CODE
    }

    fn name(&self) -> &'static str {
        "UserCode"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::USER_CODE, payload, 4)?;
        match payload[1] {
            USER_CODE_REPORT => {
                let code = payload[4..].to_vec();
                node.data
                    .set("user_code_length", DataValue::Byte(code.len() as u8));
                Ok(vec![Decoded::root(ClassEvent::UserCodeReport {
                    slot: payload[2],
                    status: payload[3],
                    code,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// ThermostatSetpoint (0x43)
// ============================================================================

const SETPOINT_SET: u8 = 0x01;
const SETPOINT_GET: u8 = 0x02;
const SETPOINT_REPORT: u8 = 0x03;

/// Thermostat setpoint codec.
///
/// Devices expect a Set encoded with the same precision/scale/size they
/// report, so the reported layout is remembered per setpoint type.
pub struct ThermostatSetpoint;

impl ThermostatSetpoint {
    fn format_key(setpoint_type: u8) -> String {
        format!("setpoint_{}_format", setpoint_type)
    }

    /// Build a Get payload for a setpoint type.
    pub fn get(setpoint_type: u8) -> Vec<u8> {
        vec![ids::THERMOSTAT_SETPOINT, SETPOINT_GET, setpoint_type]
    }

    /// Build a Set payload, echoing the device's reported number format
    /// when one is known.
    pub fn set(node: &Node, setpoint_type: u8, val: f64) -> Result<Vec<u8>, ClassError> {
        let encoded = match node.data.get_bytes(&Self::format_key(setpoint_type)) {
            Some([precision, scale, size]) => value::encode_as(val, *scale, *precision, *size)?,
            _ => value::encode(val, 0)?,
        };
        let mut payload = vec![ids::THERMOSTAT_SETPOINT, SETPOINT_SET, setpoint_type];
        payload.extend_from_slice(&encoded);
        Ok(payload)
    }
}

impl CommandClass for ThermostatSetpoint {
    fn class_id(&self) -> u8 {
        ids::THERMOSTAT_SETPOINT
    }

    fn name(&self) -> &'static str {
        "ThermostatSetpoint"
    }

    fn decode(
        &self,
        node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::THERMOSTAT_SETPOINT, payload, 5)?;
        match payload[1] {
            SETPOINT_REPORT => {
                let setpoint_type = payload[2] & 0x0F;
                let reading = value::decode_at(payload, 3, ids::THERMOSTAT_SETPOINT)?;
                node.data.set(
                    &Self::format_key(setpoint_type),
                    DataValue::Bytes(vec![reading.precision, reading.scale, reading.size]),
                );
                Ok(vec![Decoded::root(ClassEvent::ThermostatSetpointReport {
                    setpoint_type,
                    value: reading,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Clock (0x81)
// ============================================================================

const CLOCK_SET: u8 = 0x04;
const CLOCK_GET: u8 = 0x05;
const CLOCK_REPORT: u8 = 0x06;

/// Wall clock codec.
pub struct Clock;

impl Clock {
    /// Build a Set payload (weekday 1-7, hour 0-23, minute 0-59).
    pub fn set(weekday: u8, hour: u8, minute: u8) -> Vec<u8> {
        vec![
            ids::CLOCK,
            CLOCK_SET,
            (weekday << 5) | (hour & 0x1F),
            minute,
        ]
    }

    /// Build a Get payload.
    pub fn get() -> Vec<u8> {
        vec![ids::CLOCK, CLOCK_GET]
    }
}

impl CommandClass for Clock {
    fn class_id(&self) -> u8 {
        ids::CLOCK
    }

    fn name(&self) -> &'static str {
        "Clock"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::CLOCK, payload, 4)?;
        match payload[1] {
            CLOCK_REPORT => Ok(vec![Decoded::root(ClassEvent::ClockReport {
                weekday: payload[2] >> 5,
                hour: payload[2] & 0x1F,
                minute: payload[3],
            })]),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// CentralScene (0x5B)
// ============================================================================

const CENTRAL_SCENE_NOTIFICATION: u8 = 0x03;

/// Central scene key notification codec.
pub struct CentralScene;

impl CommandClass for CentralScene {
    fn class_id(&self) -> u8 {
        ids::CENTRAL_SCENE
    }

    fn name(&self) -> &'static str {
        "CentralScene"
    }

    fn decode(
        &self,
        _node: &mut Node,
        payload: &[u8],
        _classes: &ClassRegistry,
    ) -> Result<Vec<Decoded>, ClassError> {
        require_len(ids::CENTRAL_SCENE, payload, 5)?;
        match payload[1] {
            CENTRAL_SCENE_NOTIFICATION => {
                Ok(vec![Decoded::root(ClassEvent::CentralSceneNotification {
                    scene: payload[4],
                    key_attribute: payload[3] & 0x07,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_report_learns_width() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        // parameter 7, size 2, value 0x0102
        let events = Configuration
            .decode(
                &mut node,
                &[ids::CONFIGURATION, CONFIG_REPORT, 7, 2, 0x01, 0x02],
                &registry,
            )
            .unwrap();
        assert_eq!(
            events[0].event,
            ClassEvent::ConfigurationReport {
                parameter: 7,
                value: 0x0102,
                size: 2
            }
        );

        // A later set mirrors the learned 2-byte width.
        let set = Configuration::set(&node, 7, 300);
        assert_eq!(set, vec![ids::CONFIGURATION, CONFIG_SET, 7, 2, 0x01, 0x2C]);
    }

    #[test]
    fn test_configuration_set_defaults_to_one_byte() {
        let node = Node::new(6, 0);
        assert_eq!(
            Configuration::set(&node, 3, 0x55),
            vec![ids::CONFIGURATION, CONFIG_SET, 3, 1, 0x55]
        );
    }

    #[test]
    fn test_manufacturer_report_updates_node() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        let events = ManufacturerSpecific
            .decode(
                &mut node,
                &[
                    ids::MANUFACTURER_SPECIFIC,
                    MANUFACTURER_REPORT,
                    0x01,
                    0x0E,
                    0x00,
                    0x02,
                    0x00,
                    0x05,
                ],
                &registry,
            )
            .unwrap();
        assert_eq!(
            events[0].event,
            ClassEvent::ManufacturerReport {
                manufacturer_id: 0x010E,
                type_id: 0x0002,
                product_id: 0x0005
            }
        );
        assert_eq!(node.manufacturer.unwrap().manufacturer_id, 0x010E);
    }

    #[test]
    fn test_version_class_report_updates_table() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        node.update_node_info(&[ids::SWITCH_MULTILEVEL]);
        Version
            .decode(
                &mut node,
                &[ids::VERSION, VERSION_CLASS_REPORT, ids::SWITCH_MULTILEVEL, 3],
                &registry,
            )
            .unwrap();
        assert_eq!(node.class_version(ids::SWITCH_MULTILEVEL), 3);
    }

    #[test]
    fn test_wakeup_notification_clears_sleeping() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        WakeUp::set_sleeping(&mut node, true);
        assert!(WakeUp::is_sleeping(&node));

        let events = WakeUp
            .decode(&mut node, &[ids::WAKE_UP, WAKEUP_NOTIFICATION], &registry)
            .unwrap();
        assert_eq!(events[0].event, ClassEvent::WakeUpNotification);
        assert!(!WakeUp::is_sleeping(&node));
    }

    #[test]
    fn test_wakeup_interval_set_layout() {
        // 3600 seconds = 0x000E10 over three bytes.
        assert_eq!(
            WakeUp::set_interval(3600, 1),
            vec![ids::WAKE_UP, WAKEUP_INTERVAL_SET, 0x00, 0x0E, 0x10, 0x01]
        );
    }

    #[test]
    fn test_association_report_members() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        let events = Association
            .decode(
                &mut node,
                &[ids::ASSOCIATION, ASSOCIATION_REPORT, 1, 5, 0, 2, 3],
                &registry,
            )
            .unwrap();
        assert_eq!(
            events[0].event,
            ClassEvent::AssociationReport {
                group: 1,
                max_nodes: 5,
                nodes: vec![2, 3]
            }
        );
    }

    #[test]
    fn test_setpoint_set_echoes_reported_format() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        // Device reports heating setpoint 21.5 with precision 1, size 2.
        let mut report = vec![ids::THERMOSTAT_SETPOINT, SETPOINT_REPORT, 0x01];
        report.extend_from_slice(&value::encode(21.5, 0).unwrap());
        ThermostatSetpoint
            .decode(&mut node, &report, &registry)
            .unwrap();

        // A whole-number set still uses precision 1 / size 2.
        let set = ThermostatSetpoint::set(&node, 0x01, 22.0).unwrap();
        let decoded = value::decode_at(&set, 3, ids::THERMOSTAT_SETPOINT).unwrap();
        assert_eq!(decoded.precision, 1);
        assert_eq!(decoded.size, 2);
        assert_eq!(decoded.value, 22.0);
    }

    #[test]
    fn test_clock_report_unpacks_fields() {
        let registry = ClassRegistry::new();
        let mut node = Node::new(6, 0);
        // Wednesday (3), 14:45
        let events = Clock
            .decode(
                &mut node,
                &[ids::CLOCK, CLOCK_REPORT, (3 << 5) | 14, 45],
                &registry,
            )
            .unwrap();
        assert_eq!(
            events[0].event,
            ClassEvent::ClockReport {
                weekday: 3,
                hour: 14,
                minute: 45
            }
        );
    }
}
