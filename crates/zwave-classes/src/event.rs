//! Typed events produced by command-class decoding.

use crate::value::ScaledValue;

/// One decoded event with the multi-channel instance it belongs to.
///
/// Instance 0 is the node's root device; encapsulated payloads tag the
/// endpoint they were addressed from. Composite codecs return several
/// entries in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Multi-channel instance/endpoint (0 = root device).
    pub instance: u8,
    /// The decoded event.
    pub event: ClassEvent,
}

impl Decoded {
    /// An event on the root device.
    pub fn root(event: ClassEvent) -> Self {
        Decoded { instance: 0, event }
    }
}

/// A typed node event decoded from an application payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassEvent {
    /// Basic report or unsolicited basic set.
    BasicReport {
        /// 0x00 off, 0x01-0x63 level, 0xFF on.
        value: u8,
    },
    /// Basic set received from the node (scene controllers do this).
    BasicSet {
        /// Commanded value.
        value: u8,
    },
    /// Binary switch state report.
    SwitchBinaryReport {
        /// Whether the switch is on.
        on: bool,
    },
    /// Multilevel switch level report.
    SwitchMultilevelReport {
        /// Level 0-99 (0xFF = last non-zero level).
        level: u8,
    },
    /// All-switch mode report.
    SwitchAllReport {
        /// Configured all-on/all-off participation mode.
        mode: u8,
    },
    /// Binary sensor triggered/idle report.
    SensorBinaryReport {
        /// Whether the sensor is triggered.
        triggered: bool,
    },
    /// Multilevel sensor reading.
    SensorMultilevelReport {
        /// Sensor type byte (1 = temperature, 3 = luminance, ...).
        sensor_type: u8,
        /// The decoded reading.
        value: ScaledValue,
    },
    /// Meter reading.
    MeterReport {
        /// Meter type byte (1 = electric, 2 = gas, 3 = water).
        meter_type: u8,
        /// The decoded reading.
        value: ScaledValue,
    },
    /// Battery level report.
    BatteryReport {
        /// Level 0-100, or 0xFF for the low-battery warning.
        level: u8,
    },
    /// Alarm / notification report.
    AlarmReport {
        /// Alarm type byte.
        alarm_type: u8,
        /// Alarm level / event byte.
        level: u8,
    },
    /// Configuration parameter report.
    ConfigurationReport {
        /// Parameter number.
        parameter: u8,
        /// Parameter value, sign-extended from its wire size.
        value: i64,
        /// Wire size of the value (1, 2, or 4 bytes).
        size: u8,
    },
    /// Manufacturer identity report.
    ManufacturerReport {
        /// Manufacturer id.
        manufacturer_id: u16,
        /// Product type id.
        type_id: u16,
        /// Product id.
        product_id: u16,
    },
    /// Firmware/library version report.
    VersionReport {
        /// Z-Wave library type.
        library: u8,
        /// Protocol version (major, minor).
        protocol: (u8, u8),
        /// Application version (major, minor).
        application: (u8, u8),
    },
    /// Per-class version report.
    CommandClassVersionReport {
        /// Queried command class.
        class: u8,
        /// Supported version.
        version: u8,
    },
    /// The node woke up and is listening.
    WakeUpNotification,
    /// Wake-up interval report.
    WakeUpIntervalReport {
        /// Interval in seconds.
        seconds: u32,
        /// Node id notifications are sent to.
        target_node: u8,
    },
    /// Association group membership report.
    AssociationReport {
        /// Group id.
        group: u8,
        /// Maximum nodes the group can hold.
        max_nodes: u8,
        /// Member node ids.
        nodes: Vec<u8>,
    },
    /// Number of association groups the node supports.
    AssociationGroupingsReport {
        /// Group count.
        groups: u8,
    },
    /// User code slot report.
    UserCodeReport {
        /// Slot number.
        slot: u8,
        /// Slot status byte.
        status: u8,
        /// Code digits as received.
        code: Vec<u8>,
    },
    /// Thermostat setpoint report.
    ThermostatSetpointReport {
        /// Setpoint type (1 = heating, 2 = cooling, ...).
        setpoint_type: u8,
        /// The decoded setpoint.
        value: ScaledValue,
    },
    /// Wall clock report.
    ClockReport {
        /// Day of week (1 = Monday ... 7 = Sunday).
        weekday: u8,
        /// Hour 0-23.
        hour: u8,
        /// Minute 0-59.
        minute: u8,
    },
    /// Central scene key notification.
    CentralSceneNotification {
        /// Scene number.
        scene: u8,
        /// Key attribute (pressed, released, held).
        key_attribute: u8,
    },
    /// The same report, re-flagged as coming from a multi-instance endpoint.
    ///
    /// Emitted alongside the plain event for switch/sensor classes so
    /// observers tracking per-endpoint state don't have to re-dispatch.
    MultiInstanceReport {
        /// The encapsulated command class.
        class: u8,
        /// The decoded inner event.
        inner: Box<ClassEvent>,
    },
    /// The device agreed on security scheme zero.
    SecuritySchemeAgreed,
    /// The device acknowledged the network key.
    SecurityKeyVerified,
    /// The device reported its secured command classes.
    SecuredClassesReport {
        /// Command classes requiring encryption.
        classes: Vec<u8>,
    },
}
