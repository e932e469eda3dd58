//! Scaled-value encoding shared by the numeric report classes.
//!
//! Sensor, meter, and setpoint commands carry numbers as a descriptor byte
//! followed by a signed big-endian integer:
//!
//! ```text
//! +-----------+-----------+----------+
//! | precision | scale     | size     |
//! | bits 5-7  | bits 3-4  | bits 0-2 |
//! +-----------+-----------+----------+
//! ```
//!
//! `size` is 1, 2, or 4 bytes; the decoded value is the integer divided by
//! `10^precision`. Encoding picks the smallest lossless size and precision.

use crate::error::ClassError;

/// A decoded scaled value with its wire parameters.
///
/// The wire parameters are kept so a later `set` can mirror the device's
/// own precision/scale/size (thermostats reject setpoints encoded with a
/// different layout than they report).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledValue {
    /// The decoded number.
    pub value: f64,
    /// Unit scale (device-specific meaning, e.g. Celsius/Fahrenheit).
    pub scale: u8,
    /// Decimal digits the wire integer was scaled by.
    pub precision: u8,
    /// Wire size in bytes (1, 2, or 4).
    pub size: u8,
}

/// Decode a scaled value starting at `offset` in `payload`.
pub fn decode_at(payload: &[u8], offset: usize, class: u8) -> Result<ScaledValue, ClassError> {
    if payload.len() < offset + 2 {
        return Err(ClassError::PayloadTooShort {
            class,
            expected: offset + 2,
            actual: payload.len(),
        });
    }

    let descriptor = payload[offset];
    let precision = (descriptor >> 5) & 0x07;
    let scale = (descriptor >> 3) & 0x03;
    let size = descriptor & 0x07;
    if !matches!(size, 1 | 2 | 4) {
        return Err(ClassError::InvalidValueSize(size));
    }

    let end = offset + 1 + size as usize;
    if payload.len() < end {
        return Err(ClassError::PayloadTooShort {
            class,
            expected: end,
            actual: payload.len(),
        });
    }

    let bytes = &payload[offset + 1..end];
    // Sign-extend from the most significant wire byte.
    let mut raw: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in bytes {
        raw = (raw << 8) | i64::from(b);
    }

    Ok(ScaledValue {
        value: raw as f64 / 10f64.powi(precision as i32),
        scale,
        precision,
        size,
    })
}

/// Encode a value with auto-selected precision and size.
///
/// Returns the descriptor byte followed by the big-endian integer bytes.
/// Fails when the value needs more than 7 decimal digits or does not fit a
/// signed 32-bit integer after scaling.
pub fn encode(value: f64, scale: u8) -> Result<Vec<u8>, ClassError> {
    let (raw, precision) = scale_to_integer(value)?;
    encode_with(raw, precision, scale, smallest_size(raw))
}

/// Encode a value forcing the given wire parameters (used to echo a
/// device's reported precision/scale/size on set).
pub fn encode_as(value: f64, scale: u8, precision: u8, size: u8) -> Result<Vec<u8>, ClassError> {
    if precision > 7 {
        return Err(ClassError::PrecisionOverflow(value));
    }
    if !matches!(size, 1 | 2 | 4) {
        return Err(ClassError::InvalidValueSize(size));
    }
    let scaled = value * 10f64.powi(precision as i32);
    let raw = scaled.round();
    if raw > i64::from(i32::MAX) as f64 || raw < i64::from(i32::MIN) as f64 {
        return Err(ClassError::ValueOutOfRange(value));
    }
    encode_with(raw as i64, precision, scale, size)
}

fn encode_with(raw: i64, precision: u8, scale: u8, size: u8) -> Result<Vec<u8>, ClassError> {
    let descriptor = (precision << 5) | ((scale & 0x03) << 3) | size;
    let mut out = vec![descriptor];
    match size {
        1 => out.push(raw as u8),
        2 => out.extend_from_slice(&(raw as i16).to_be_bytes()),
        4 => out.extend_from_slice(&(raw as i32).to_be_bytes()),
        other => return Err(ClassError::InvalidValueSize(other)),
    }
    Ok(out)
}

/// Find the smallest precision that represents `value` losslessly, and the
/// resulting integer.
fn scale_to_integer(value: f64) -> Result<(i64, u8), ClassError> {
    for precision in 0..=7u8 {
        let scaled = value * 10f64.powi(precision as i32);
        let rounded = scaled.round();
        if (scaled - rounded).abs() < 1e-6 {
            if rounded > i64::from(i32::MAX) as f64 || rounded < i64::from(i32::MIN) as f64 {
                return Err(ClassError::ValueOutOfRange(value));
            }
            return Ok((rounded as i64, precision));
        }
    }
    Err(ClassError::PrecisionOverflow(value))
}

fn smallest_size(raw: i64) -> u8 {
    if raw >= i64::from(i8::MIN) && raw <= i64::from(i8::MAX) {
        1
    } else if raw >= i64::from(i16::MIN) && raw <= i64::from(i16::MAX) {
        2
    } else {
        4
    }
}

/// Sign-extend a configuration-style plain integer field (no descriptor).
pub fn int_from_bytes(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut raw: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in bytes {
        raw = (raw << 8) | i64::from(b);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: f64) {
        let encoded = encode(value, 0).unwrap();
        let decoded = decode_at(&encoded, 0, 0x31).unwrap();
        let tolerance = 10f64.powi(-(decoded.precision as i32));
        assert!(
            (decoded.value - value).abs() <= tolerance,
            "value {} decoded as {}",
            value,
            decoded.value
        );
    }

    #[test]
    fn test_roundtrip_representative_values() {
        for v in [0.0, 1.5, -1.5, 127.0, -128.0, 32767.0, -32768.0] {
            roundtrip(v);
        }
    }

    #[test]
    fn test_auto_size_selection() {
        assert_eq!(encode(1.0, 0).unwrap().len(), 2); // 1 byte
        assert_eq!(encode(300.0, 0).unwrap().len(), 3); // 2 bytes
        assert_eq!(encode(100000.0, 0).unwrap().len(), 5); // 4 bytes
    }

    #[test]
    fn test_precision_packing() {
        let encoded = encode(21.5, 1).unwrap();
        let descriptor = encoded[0];
        assert_eq!((descriptor >> 5) & 0x07, 1); // precision 1
        assert_eq!((descriptor >> 3) & 0x03, 1); // scale 1
        assert_eq!(descriptor & 0x07, 2); // 215 needs 2 bytes
        assert_eq!(&encoded[1..], &215i16.to_be_bytes());
    }

    #[test]
    fn test_negative_sign_extension() {
        // -12.8 at precision 1 is -128, fits one byte.
        let encoded = encode(-12.8, 0).unwrap();
        let decoded = decode_at(&encoded, 0, 0x31).unwrap();
        assert_eq!(decoded.value, -12.8);
        assert_eq!(decoded.size, 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            encode(3.0e9, 0),
            Err(ClassError::ValueOutOfRange(_))
        ));
        // eight decimal digits would need precision > 7
        assert!(matches!(
            encode(0.12345678, 0),
            Err(ClassError::PrecisionOverflow(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_size() {
        // descriptor with size 3
        assert!(matches!(
            decode_at(&[0x03, 0x01, 0x02, 0x03], 0, 0x31),
            Err(ClassError::InvalidValueSize(3))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        // descriptor says 4 bytes follow, only 2 do
        assert!(matches!(
            decode_at(&[0x04, 0x01, 0x02], 0, 0x31),
            Err(ClassError::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn test_encode_as_echoes_device_layout() {
        let encoded = encode_as(21.0, 0, 1, 2).unwrap();
        let decoded = decode_at(&encoded, 0, 0x43).unwrap();
        assert_eq!(decoded.value, 21.0);
        assert_eq!(decoded.precision, 1);
        assert_eq!(decoded.size, 2);
    }
}
