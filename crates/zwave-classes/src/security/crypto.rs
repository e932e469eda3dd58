//! AES primitives for the scheme-0 secure messaging format.
//!
//! The wire format is fixed: payloads are encrypted with AES-128 in OFB
//! mode, authenticated with an 8-byte AES-CBC-MAC, and both keys are
//! derived from the 16-byte network key by ECB-encrypting two constant
//! blocks.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Constant block encrypted to derive the payload encryption key.
const ENCRYPT_PASSWORD: [u8; 16] = [0xAA; 16];
/// Constant block encrypted to derive the authentication key.
const AUTH_PASSWORD: [u8; 16] = [0x55; 16];

/// First half of every outbound initialization vector.
pub const IV_SENDER_HALF: [u8; 8] = [0xAA; 8];

/// Encrypt one 16-byte block with AES-128-ECB.
pub fn ecb_encrypt(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut out);
    out.into()
}

/// Derive the (encryption, authentication) key pair from a network key.
///
/// Called on every use so the derivation always reflects the currently
/// active key (the all-zero key during enrollment).
pub fn derive_keys(network_key: &[u8; 16]) -> ([u8; 16], [u8; 16]) {
    (
        ecb_encrypt(network_key, &ENCRYPT_PASSWORD),
        ecb_encrypt(network_key, &AUTH_PASSWORD),
    )
}

/// Build the 16-byte IV from the sender and receiver nonce halves.
pub fn build_iv(sender_half: &[u8; 8], receiver_nonce: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(sender_half);
    iv[8..].copy_from_slice(receiver_nonce);
    iv
}

/// AES-128-OFB keystream application (encrypt and decrypt are identical).
///
/// The feedback register starts at the IV and is re-encrypted for every
/// 16-byte block of keystream.
pub fn ofb_apply(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    let mut register = *iv;
    for chunk in data.chunks_mut(16) {
        register = ecb_encrypt(key, &register);
        for (byte, ks) in chunk.iter_mut().zip(register.iter()) {
            *byte ^= ks;
        }
    }
}

/// Compute the 8-byte message authentication code.
///
/// The authenticated data layout is fixed:
/// `[securityCommand, sender, receiver, payloadLen, payload…]`, zero-padded
/// to 16-byte blocks and chained through AES-CBC under the auth key, with
/// the encrypted IV as the first chaining value.
pub fn compute_mac(
    auth_key: &[u8; 16],
    iv: &[u8; 16],
    security_command: u8,
    sender: u8,
    receiver: u8,
    payload: &[u8],
) -> [u8; 8] {
    let mut auth_data = Vec::with_capacity(4 + payload.len());
    auth_data.push(security_command);
    auth_data.push(sender);
    auth_data.push(receiver);
    auth_data.push(payload.len() as u8);
    auth_data.extend_from_slice(payload);

    let mut register = ecb_encrypt(auth_key, iv);
    for chunk in auth_data.chunks(16) {
        for (i, &byte) in chunk.iter().enumerate() {
            register[i] ^= byte;
        }
        register = ecb_encrypt(auth_key, &register);
    }

    let mut mac = [0u8; 8];
    mac.copy_from_slice(&register[..8]);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation_is_deterministic() {
        let key = [0x11; 16];
        let (enc1, auth1) = derive_keys(&key);
        let (enc2, auth2) = derive_keys(&key);
        assert_eq!(enc1, enc2);
        assert_eq!(auth1, auth2);
        assert_ne!(enc1, auth1);
    }

    #[test]
    fn test_different_network_keys_differ() {
        let (enc_a, _) = derive_keys(&[0x00; 16]);
        let (enc_b, _) = derive_keys(&[0x01; 16]);
        assert_ne!(enc_a, enc_b);
    }

    #[test]
    fn test_ofb_roundtrip() {
        let key = [0x42; 16];
        let iv = build_iv(&IV_SENDER_HALF, &[7; 8]);
        let original = b"hello secure world, beyond one block".to_vec();

        let mut data = original.clone();
        ofb_apply(&key, &iv, &mut data);
        assert_ne!(data, original);

        ofb_apply(&key, &iv, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_mac_depends_on_every_input() {
        let auth_key = [0x33; 16];
        let iv = build_iv(&IV_SENDER_HALF, &[9; 8]);
        let base = compute_mac(&auth_key, &iv, 0x81, 1, 5, &[1, 2, 3]);

        assert_ne!(base, compute_mac(&auth_key, &iv, 0xC1, 1, 5, &[1, 2, 3]));
        assert_ne!(base, compute_mac(&auth_key, &iv, 0x81, 2, 5, &[1, 2, 3]));
        assert_ne!(base, compute_mac(&auth_key, &iv, 0x81, 1, 6, &[1, 2, 3]));
        assert_ne!(base, compute_mac(&auth_key, &iv, 0x81, 1, 5, &[1, 2, 4]));
        assert_ne!(
            base,
            compute_mac(&[0x34; 16], &iv, 0x81, 1, 5, &[1, 2, 3])
        );
    }
}
