//! Scheme-0 secure messaging: nonce exchange, encryption, enrollment.
//!
//! ```text
//! encapsulated payload (class 0x98, command 0x81 / 0xC1):
//!   +-------+---------+---------------+------------+----------+---------+
//!   | class | command | senderNonce   | ciphertext | nonceId  | MAC     |
//!   | 0x98  | 0x81    | 8 bytes       | N bytes    | 1 byte   | 8 bytes |
//!   +-------+---------+---------------+------------+----------+---------+
//!
//!   ciphertext = OFB( [seqByte, innerClass, innerCommand, args…] )
//! ```
//!
//! Unlike the stateless codecs in the registry, this module drives a
//! per-node handshake: it produces reply payloads (nonce reports, nonce
//! requests, encrypted fragments) that the driver must transmit, plus the
//! decrypted inner payloads for normal class dispatch. Session state lives
//! in the node's data bag ([`SecuritySession`]); only the cryptography and
//! the protocol logic live here.

pub mod crypto;

use std::collections::VecDeque;

use zwave_model::{Node, SecuritySession};

use crate::error::ClassError;
use crate::event::{ClassEvent, Decoded};
use crate::ids;

// ============================================================================
// Commands
// ============================================================================

/// Request the list of classes the node secures.
pub const CMD_SUPPORTED_GET: u8 = 0x02;
/// List of classes the node secures.
pub const CMD_SUPPORTED_REPORT: u8 = 0x03;
/// Ask the node which security schemes it supports.
pub const CMD_SCHEME_GET: u8 = 0x04;
/// Node's supported security schemes.
pub const CMD_SCHEME_REPORT: u8 = 0x05;
/// Deliver the network key (always sent encrypted).
pub const CMD_NETWORK_KEY_SET: u8 = 0x06;
/// Node confirms receipt of the network key.
pub const CMD_NETWORK_KEY_VERIFY: u8 = 0x07;
/// Request a fresh nonce from the peer.
pub const CMD_NONCE_GET: u8 = 0x40;
/// A fresh 8-byte nonce.
pub const CMD_NONCE_REPORT: u8 = 0x80;
/// Encrypted, authenticated payload.
pub const CMD_MESSAGE_ENCAP: u8 = 0x81;
/// Encrypted payload that doubles as a nonce request.
pub const CMD_MESSAGE_ENCAP_NONCE_GET: u8 = 0xC1;

/// Largest plaintext (after the sequencing byte) per encrypted fragment.
/// Longer payloads are split in two and reassembled by the receiver.
pub const MAX_FRAGMENT: usize = 28;

/// Sequencing-byte flag: this message is one fragment of a pair.
const SEQ_SEQUENCED: u8 = 0x10;
/// Sequencing-byte flag: this is the second fragment.
const SEQ_SECOND: u8 = 0x20;

/// Marker separating supported from controlled classes in a
/// supported-classes report.
const CLASS_LIST_MARK: u8 = 0xEF;

// ============================================================================
// Outcome
// ============================================================================

/// What handling one security payload produced.
///
/// `replies` are application payloads (class byte first) the driver must
/// queue for transmission to the same node, in order. `decrypted` carries
/// inner payloads of non-security classes for normal registry dispatch.
#[derive(Debug, Default)]
pub struct SecurityOutcome {
    /// Typed events for the application layer.
    pub events: Vec<Decoded>,
    /// Payloads to send back to the node, in order.
    pub replies: Vec<Vec<u8>>,
    /// Decrypted inner payloads awaiting normal class dispatch.
    pub decrypted: Vec<Vec<u8>>,
}

// ============================================================================
// Outbound
// ============================================================================

/// Start secure enrollment of a freshly included node.
///
/// Puts the session in enrollment mode (key exchange runs under the
/// all-zero key) and returns the scheme-get payload to send.
pub fn begin_enrollment(node: &mut Node, network_key: [u8; 16]) -> Vec<u8> {
    let session = node.data.security_mut();
    session.enrolling = true;
    session.key_verified = false;
    session.scheme_agreed = false;
    session.network_key = network_key;
    // supported-schemes byte 0: scheme 0 only
    vec![ids::SECURITY, CMD_SCHEME_GET, 0x00]
}

/// Queue an application payload for encrypted delivery.
///
/// Splits payloads over [`MAX_FRAGMENT`] bytes into a sequenced pair.
/// Returns the nonce-get payload to send, or `None` when a nonce request
/// is already outstanding.
pub fn queue_secured(node: &mut Node, payload: Vec<u8>) -> Option<Vec<u8>> {
    let session = node.data.security_mut();
    let sequence = session.next_sequence();
    enqueue_fragments(&mut session.pending, sequence, payload);
    if session.awaiting_nonce {
        return None;
    }
    session.awaiting_nonce = true;
    Some(vec![ids::SECURITY, CMD_NONCE_GET])
}

/// Split a payload into sequenced fragments, prepending the sequencing
/// byte each fragment will be encrypted with.
fn enqueue_fragments(pending: &mut VecDeque<Vec<u8>>, sequence: u8, payload: Vec<u8>) {
    if payload.len() <= MAX_FRAGMENT {
        let mut plain = Vec::with_capacity(1 + payload.len());
        plain.push(0x00);
        plain.extend_from_slice(&payload);
        pending.push_back(plain);
        return;
    }

    let (head, tail) = payload.split_at(MAX_FRAGMENT);
    let mut first = Vec::with_capacity(1 + head.len());
    first.push(SEQ_SEQUENCED | sequence);
    first.extend_from_slice(head);
    let mut second = Vec::with_capacity(1 + tail.len());
    second.push(SEQ_SEQUENCED | SEQ_SECOND | sequence);
    second.extend_from_slice(tail);
    pending.push_back(first);
    pending.push_back(second);
}

/// Encrypt the oldest queued fragment using the cached device nonce.
///
/// Consumes the nonce (nonces are single-use). Errors when no fresh
/// device nonce is available; the caller should re-request one.
fn encrypt_next(session: &mut SecuritySession, controller_id: u8, node_id: u8)
    -> Result<Vec<u8>, ClassError>
{
    let device_nonce = session
        .take_device_nonce()
        .ok_or(ClassError::NonceUnavailable { node: node_id })?;
    let mut plaintext = match session.pending.pop_front() {
        Some(p) => p,
        None => return Err(ClassError::NonceUnavailable { node: node_id }),
    };

    let (enc_key, auth_key) = crypto::derive_keys(&session.active_key());
    let iv = crypto::build_iv(&crypto::IV_SENDER_HALF, &device_nonce);
    crypto::ofb_apply(&enc_key, &iv, &mut plaintext);
    let ciphertext = plaintext;
    let mac = crypto::compute_mac(
        &auth_key,
        &iv,
        CMD_MESSAGE_ENCAP,
        controller_id,
        node_id,
        &ciphertext,
    );

    let mut out = Vec::with_capacity(2 + 8 + ciphertext.len() + 1 + 8);
    out.push(ids::SECURITY);
    out.push(CMD_MESSAGE_ENCAP);
    out.extend_from_slice(&crypto::IV_SENDER_HALF);
    out.extend_from_slice(&ciphertext);
    out.push(device_nonce[0]);
    out.extend_from_slice(&mac);
    Ok(out)
}

// ============================================================================
// Inbound
// ============================================================================

/// Handle one inbound security-class payload from `node`.
///
/// `payload` starts at the class byte (0x98). Authentication failures and
/// stale nonces surface as errors; the driver logs and drops them.
pub fn handle(
    node: &mut Node,
    payload: &[u8],
    controller_id: u8,
) -> Result<SecurityOutcome, ClassError> {
    if payload.len() < 2 {
        return Err(ClassError::PayloadTooShort {
            class: ids::SECURITY,
            expected: 2,
            actual: payload.len(),
        });
    }

    let mut outcome = SecurityOutcome::default();
    match payload[1] {
        CMD_SCHEME_REPORT => handle_scheme_report(node, payload, &mut outcome)?,
        CMD_NONCE_GET => {
            let nonce = node.data.security_mut().fresh_controller_nonce();
            let mut reply = Vec::with_capacity(10);
            reply.push(ids::SECURITY);
            reply.push(CMD_NONCE_REPORT);
            reply.extend_from_slice(&nonce);
            outcome.replies.push(reply);
        }
        CMD_NONCE_REPORT => handle_nonce_report(node, payload, controller_id, &mut outcome)?,
        CMD_MESSAGE_ENCAP | CMD_MESSAGE_ENCAP_NONCE_GET => {
            handle_encap(node, payload, controller_id, &mut outcome)?
        }
        other => {
            log::debug!("node {}: unhandled security command 0x{:02X}", node.id, other);
        }
    }
    Ok(outcome)
}

/// Scheme report: agree on scheme 0 and, during enrollment, push the
/// network key through the encrypted channel.
fn handle_scheme_report(
    node: &mut Node,
    payload: &[u8],
    outcome: &mut SecurityOutcome,
) -> Result<(), ClassError> {
    if payload.len() < 3 {
        return Err(ClassError::PayloadTooShort {
            class: ids::SECURITY,
            expected: 3,
            actual: payload.len(),
        });
    }
    // scheme byte 0x00 means the device supports scheme 0 only
    let session = node.data.security_mut();
    session.scheme_agreed = true;
    outcome
        .events
        .push(Decoded::root(ClassEvent::SecuritySchemeAgreed));

    if session.enrolling && !session.key_verified {
        let mut key_set = Vec::with_capacity(2 + 16);
        key_set.push(ids::SECURITY);
        key_set.push(CMD_NETWORK_KEY_SET);
        key_set.extend_from_slice(&session.network_key);
        // the key travels encrypted under the all-zero enrollment key
        let node_id = node.id;
        if let Some(nonce_get) = queue_secured(node, key_set) {
            outcome.replies.push(nonce_get);
        } else {
            log::warn!("node {}: nonce request already pending during key set", node_id);
        }
    }
    Ok(())
}

/// Nonce report: cache it and flush the send queue.
fn handle_nonce_report(
    node: &mut Node,
    payload: &[u8],
    controller_id: u8,
    outcome: &mut SecurityOutcome,
) -> Result<(), ClassError> {
    if payload.len() < 10 {
        return Err(ClassError::PayloadTooShort {
            class: ids::SECURITY,
            expected: 10,
            actual: payload.len(),
        });
    }
    let mut nonce = [0u8; 8];
    nonce.copy_from_slice(&payload[2..10]);

    let node_id = node.id;
    let session = node.data.security_mut();
    session.store_device_nonce(nonce);
    if session.pending.is_empty() {
        log::debug!("node {}: nonce report with nothing queued", node_id);
        return Ok(());
    }

    outcome.replies.push(encrypt_next(session, controller_id, node_id)?);
    if !session.pending.is_empty() {
        // one nonce per fragment
        session.awaiting_nonce = true;
        outcome.replies.push(vec![ids::SECURITY, CMD_NONCE_GET]);
    }
    Ok(())
}

/// Message encapsulation: authenticate, decrypt, reassemble, dispatch.
fn handle_encap(
    node: &mut Node,
    payload: &[u8],
    controller_id: u8,
    outcome: &mut SecurityOutcome,
) -> Result<(), ClassError> {
    // class + cmd + senderNonce(8) + seqByte + nonceId + mac(8)
    if payload.len() < 20 {
        return Err(ClassError::PayloadTooShort {
            class: ids::SECURITY,
            expected: 20,
            actual: payload.len(),
        });
    }

    let node_id = node.id;
    let session = node.data.security_mut();
    let controller_nonce = match session.controller_nonce {
        Some(n) if n.is_fresh() => n.bytes,
        _ => return Err(ClassError::NonceUnavailable { node: node_id }),
    };

    let sender_half: [u8; 8] = payload[2..10]
        .try_into()
        .map_err(|_| ClassError::NonceUnavailable { node: node_id })?;
    let mac_start = payload.len() - 8;
    let nonce_id = payload[mac_start - 1];
    let ciphertext = &payload[10..mac_start - 1];
    let received_mac = &payload[mac_start..];

    if nonce_id != controller_nonce[0] {
        return Err(ClassError::NonceUnavailable { node: node_id });
    }

    let (enc_key, auth_key) = crypto::derive_keys(&session.active_key());
    let iv = crypto::build_iv(&sender_half, &controller_nonce);
    let mac = crypto::compute_mac(
        &auth_key,
        &iv,
        payload[1],
        node_id,
        controller_id,
        ciphertext,
    );
    if mac != received_mac {
        return Err(ClassError::AuthenticationFailed { node: node_id });
    }

    // the controller nonce is spent whether or not reassembly completes
    session.controller_nonce = None;

    let mut plaintext = ciphertext.to_vec();
    crypto::ofb_apply(&enc_key, &iv, &mut plaintext);
    let sequencing = plaintext[0];
    let fragment = plaintext[1..].to_vec();

    let inner = if sequencing & SEQ_SEQUENCED != 0 {
        if sequencing & SEQ_SECOND == 0 {
            session.partial = Some(fragment);
            None
        } else {
            let mut whole = session.partial.take().unwrap_or_default();
            whole.extend_from_slice(&fragment);
            Some(whole)
        }
    } else {
        Some(fragment)
    };

    if payload[1] == CMD_MESSAGE_ENCAP_NONCE_GET {
        let nonce = session.fresh_controller_nonce();
        let mut reply = Vec::with_capacity(10);
        reply.push(ids::SECURITY);
        reply.push(CMD_NONCE_REPORT);
        reply.extend_from_slice(&nonce);
        outcome.replies.push(reply);
    }

    if let Some(inner) = inner {
        dispatch_inner(node, inner, outcome);
    }
    Ok(())
}

/// Route a decrypted inner payload: security-class commands are consumed
/// here, everything else goes back to the driver for registry dispatch.
fn dispatch_inner(node: &mut Node, inner: Vec<u8>, outcome: &mut SecurityOutcome) {
    if inner.len() < 2 {
        log::debug!("node {}: decrypted payload too short, dropping", node.id);
        return;
    }
    if inner[0] != ids::SECURITY {
        log::trace!("node {}: decrypted [{}]", node.id, hex::encode(&inner));
        outcome.decrypted.push(inner);
        return;
    }

    match inner[1] {
        CMD_NETWORK_KEY_VERIFY => {
            let session = node.data.security_mut();
            session.key_verified = true;
            session.enrolling = false;
            outcome
                .events
                .push(Decoded::root(ClassEvent::SecurityKeyVerified));
            // learn which classes the node wants secured
            let node_id = node.id;
            if let Some(nonce_get) =
                queue_secured(node, vec![ids::SECURITY, CMD_SUPPORTED_GET])
            {
                outcome.replies.push(nonce_get);
            } else {
                log::debug!("node {}: supported-get deferred, nonce pending", node_id);
            }
        }
        CMD_SUPPORTED_REPORT => {
            // [class, cmd, reserved, classes…, 0xEF, controlled…]
            let classes: Vec<u8> = inner
                .get(3..)
                .unwrap_or(&[])
                .iter()
                .copied()
                .take_while(|&c| c != CLASS_LIST_MARK)
                .collect();
            node.update_secured_node_info(&classes);
            outcome
                .events
                .push(Decoded::root(ClassEvent::SecuredClassesReport { classes }));
        }
        other => {
            log::debug!(
                "node {}: unhandled decrypted security command 0x{:02X}",
                node.id,
                other
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
