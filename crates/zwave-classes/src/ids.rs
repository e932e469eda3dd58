//! Command-class ids.

/// Basic get/set/report.
pub const BASIC: u8 = 0x20;
/// Binary switch.
pub const SWITCH_BINARY: u8 = 0x25;
/// Multilevel switch (dimmers, shutters).
pub const SWITCH_MULTILEVEL: u8 = 0x26;
/// All-switch broadcast behavior.
pub const SWITCH_ALL: u8 = 0x27;
/// Binary sensor.
pub const SENSOR_BINARY: u8 = 0x30;
/// Multilevel sensor.
pub const SENSOR_MULTILEVEL: u8 = 0x31;
/// Accumulated consumption meter.
pub const METER: u8 = 0x32;
/// Thermostat setpoint.
pub const THERMOSTAT_SETPOINT: u8 = 0x43;
/// CRC16 encapsulation.
pub const CRC16_ENCAP: u8 = 0x56;
/// Central scene notifications.
pub const CENTRAL_SCENE: u8 = 0x5B;
/// Multi-instance (v1) / multi-channel (v2) encapsulation.
pub const MULTI_INSTANCE: u8 = 0x60;
/// User codes (locks, keypads).
pub const USER_CODE: u8 = 0x63;
/// Device configuration parameters.
pub const CONFIGURATION: u8 = 0x70;
/// Alarm / notification.
pub const ALARM: u8 = 0x71;
/// Manufacturer identity.
pub const MANUFACTURER_SPECIFIC: u8 = 0x72;
/// Battery level.
pub const BATTERY: u8 = 0x80;
/// Wall clock.
pub const CLOCK: u8 = 0x81;
/// Wake-up interval handling for sleeping devices.
pub const WAKE_UP: u8 = 0x84;
/// Association groups.
pub const ASSOCIATION: u8 = 0x85;
/// Version negotiation.
pub const VERSION: u8 = 0x86;
/// Multi-command encapsulation.
pub const MULTI_CMD: u8 = 0x8F;
/// Secure messaging (scheme 0).
pub const SECURITY: u8 = 0x98;
