//! Per-node secure-messaging session state.
//!
//! The security sub-protocol exchanges single-use 8-byte nonces and keeps a
//! queue of payloads waiting for a nonce. The session stores only state; the
//! cryptography itself lives in the command-class layer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng;

/// An 8-byte nonce with its creation time.
#[derive(Debug, Clone, Copy)]
pub struct Nonce {
    /// The nonce bytes.
    pub bytes: [u8; 8],
    /// When the nonce was generated or received.
    pub created: Instant,
}

impl Nonce {
    /// A nonce older than this is dead for both encrypt and decrypt.
    pub const LIFETIME: Duration = Duration::from_secs(10);

    /// Generate a random nonce stamped now.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill(&mut bytes);
        Nonce {
            bytes,
            created: Instant::now(),
        }
    }

    /// Wrap received nonce bytes, stamping the age timer now.
    pub fn received(bytes: [u8; 8]) -> Self {
        Nonce {
            bytes,
            created: Instant::now(),
        }
    }

    /// Whether the nonce is still within its validity window.
    pub fn is_fresh(&self) -> bool {
        self.created.elapsed() < Self::LIFETIME
    }
}

/// Secure-messaging state for one node.
///
/// Lives in the node's data bag under [`SecuritySession::DATA_KEY`].
#[derive(Debug, Clone)]
pub struct SecuritySession {
    /// Controller-generated nonce handed to the device for its next
    /// encrypted message to us.
    pub controller_nonce: Option<Nonce>,
    /// Last nonce the device reported, used for our next encrypted send.
    pub device_nonce: Option<Nonce>,
    /// Application payloads queued until a device nonce arrives.
    pub pending: VecDeque<Vec<u8>>,
    /// First fragment of a split inbound message awaiting its second half.
    pub partial: Option<Vec<u8>>,
    /// 4-bit rolling sequence counter for fragmented sends.
    sequence: u8,
    /// Scheme zero has been agreed with the device.
    pub scheme_agreed: bool,
    /// A nonce request is outstanding.
    pub awaiting_nonce: bool,
    /// The node is being enrolled (network key not yet exchanged).
    pub enrolling: bool,
    /// The device confirmed receipt of the network key.
    pub key_verified: bool,
    /// The 16-byte network key for this network.
    pub network_key: [u8; 16],
}

impl SecuritySession {
    /// Data bag key under which the session is stored.
    pub const DATA_KEY: &'static str = "security_session";

    /// Create a fresh session with no keys negotiated.
    pub fn new() -> Self {
        SecuritySession {
            controller_nonce: None,
            device_nonce: None,
            pending: VecDeque::new(),
            partial: None,
            sequence: 0,
            scheme_agreed: false,
            awaiting_nonce: false,
            enrolling: false,
            key_verified: false,
            network_key: [0u8; 16],
        }
    }

    /// The key encrypt/auth material must be derived from right now.
    ///
    /// During enrollment the key exchange itself runs under the all-zero
    /// initial key; afterwards the configured network key is active.
    pub fn active_key(&self) -> [u8; 16] {
        if self.enrolling && !self.key_verified {
            [0u8; 16]
        } else {
            self.network_key
        }
    }

    /// Advance and return the 4-bit sequence counter.
    pub fn next_sequence(&mut self) -> u8 {
        self.sequence = (self.sequence + 1) & 0x0F;
        self.sequence
    }

    /// Return the cached controller nonce if fresh, generating a new one
    /// when none is cached or the cached one has aged out.
    pub fn fresh_controller_nonce(&mut self) -> [u8; 8] {
        match self.controller_nonce {
            Some(n) if n.is_fresh() => n.bytes,
            _ => {
                let n = Nonce::generate();
                self.controller_nonce = Some(n);
                n.bytes
            }
        }
    }

    /// Cache a device nonce with a fresh age timer.
    pub fn store_device_nonce(&mut self, bytes: [u8; 8]) {
        self.device_nonce = Some(Nonce::received(bytes));
        self.awaiting_nonce = false;
    }

    /// Take the device nonce for an encrypt attempt; `None` when missing
    /// or older than the validity window.
    pub fn take_device_nonce(&mut self) -> Option<[u8; 8]> {
        let nonce = self.device_nonce.take()?;
        if nonce.is_fresh() {
            Some(nonce.bytes)
        } else {
            log::debug!("device nonce expired, blocking encrypt");
            None
        }
    }
}

impl Default for SecuritySession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps_at_four_bits() {
        let mut s = SecuritySession::new();
        for _ in 0..15 {
            s.next_sequence();
        }
        assert_eq!(s.next_sequence(), 0);
        assert_eq!(s.next_sequence(), 1);
    }

    #[test]
    fn test_active_key_during_enrollment() {
        let mut s = SecuritySession::new();
        s.network_key = [0x42; 16];
        assert_eq!(s.active_key(), [0x42; 16]);

        s.enrolling = true;
        assert_eq!(s.active_key(), [0u8; 16]);

        s.key_verified = true;
        assert_eq!(s.active_key(), [0x42; 16]);
    }

    #[test]
    fn test_stale_device_nonce_blocks_encrypt() {
        let mut s = SecuritySession::new();
        s.device_nonce = Some(Nonce {
            bytes: [1; 8],
            created: Instant::now() - Duration::from_secs(11),
        });
        assert_eq!(s.take_device_nonce(), None);

        s.store_device_nonce([2; 8]);
        assert_eq!(s.take_device_nonce(), Some([2; 8]));
        // consumed
        assert!(s.device_nonce.is_none());
    }
}
