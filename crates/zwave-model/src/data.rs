//! Per-node typed data bag.
//!
//! Command-class codecs negotiate per-node parameters (configuration value
//! widths, setpoint precision, wake-up flags, the security session) and need
//! somewhere to keep them between frames. The data bag is a lazily populated
//! string-keyed store of typed values scoped to one node.

use std::collections::HashMap;

use crate::security::SecuritySession;

/// A value stored in a node's data bag.
#[derive(Debug, Clone)]
pub enum DataValue {
    /// Single byte (parameter sizes, field lengths).
    Byte(u8),
    /// Unsigned 32-bit value (intervals, counters).
    U32(u32),
    /// Boolean flag (sleeping, always-awake).
    Bool(bool),
    /// Raw byte buffer.
    Bytes(Vec<u8>),
    /// Secure-messaging session state.
    Security(SecuritySession),
}

/// Typed key→value store scoped to one node.
#[derive(Debug, Clone, Default)]
pub struct DataBag {
    values: HashMap<String, DataValue>,
}

impl DataBag {
    /// Create an empty data bag.
    pub fn new() -> Self {
        DataBag {
            values: HashMap::new(),
        }
    }

    /// Store a value, replacing any previous one under the same key.
    pub fn set(&mut self, key: &str, value: DataValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.values.get(key)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.values.remove(key)
    }

    /// Get a byte value, if the key holds one.
    pub fn get_byte(&self, key: &str) -> Option<u8> {
        match self.values.get(key) {
            Some(DataValue::Byte(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get a u32 value, if the key holds one.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.values.get(key) {
            Some(DataValue::U32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a boolean flag; missing keys read as `false`.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(DataValue::Bool(true)))
    }

    /// Get a byte buffer, if the key holds one.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.values.get(key) {
            Some(DataValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Get the security session, if one has been created.
    pub fn security(&self) -> Option<&SecuritySession> {
        match self.values.get(SecuritySession::DATA_KEY) {
            Some(DataValue::Security(s)) => Some(s),
            _ => None,
        }
    }

    /// Get the security session, creating a fresh one on first use.
    pub fn security_mut(&mut self) -> &mut SecuritySession {
        let entry = self
            .values
            .entry(SecuritySession::DATA_KEY.to_string())
            .or_insert_with(|| DataValue::Security(SecuritySession::new()));
        match entry {
            DataValue::Security(s) => s,
            // DATA_KEY is reserved; anything else under it is replaced.
            other => {
                *other = DataValue::Security(SecuritySession::new());
                match other {
                    DataValue::Security(s) => s,
                    _ => unreachable!(),
                }
            }
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut bag = DataBag::new();
        bag.set("param_size", DataValue::Byte(2));
        bag.set("interval", DataValue::U32(3600));
        bag.set("sleeping", DataValue::Bool(true));

        assert_eq!(bag.get_byte("param_size"), Some(2));
        assert_eq!(bag.get_u32("interval"), Some(3600));
        assert!(bag.get_flag("sleeping"));
        assert!(!bag.get_flag("missing"));
        assert_eq!(bag.get_byte("interval"), None); // wrong type
    }

    #[test]
    fn test_security_session_lazy_init() {
        let mut bag = DataBag::new();
        assert!(bag.security().is_none());

        bag.security_mut().scheme_agreed = true;
        assert!(bag.security().unwrap().scheme_agreed);
    }
}
