//! Transaction state machine: exactly one in-flight request.
//!
//! ```text
//!   Idle ──send──▶ WaitAck ──response──▶ SendDataReady ──callback──▶ Complete
//!                     │                        │
//!                     │ response, no callback  │ bad status / CAN
//!                     ▼                        ▼
//!                  Complete                  Error
//! ```
//!
//! The sender blocks on a bounded(1) completion channel; the receive path
//! resolves the transaction by feeding parsed messages into
//! [`PendingSlot::update`]. A CAN frame forces `Error` from any stage and a
//! 10 second wait without resolution counts as failure (reported, not
//! thrown).

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use zwave_proto::{Message, MessageType, FUNC_SEND_DATA, TRANSMIT_COMPLETE_OK};

/// Stage of the in-flight transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    /// Nothing in flight.
    Idle,
    /// Frame written, waiting for the transceiver's serial ACK/response.
    WaitAck,
    /// Response received, waiting for the data-ready callback.
    SendDataReady,
    /// Resolved successfully.
    Complete,
    /// Resolved with a failure (bad status, CAN, NAK, or timeout).
    Error,
}

/// The tracked outbound request.
#[derive(Debug)]
struct Pending {
    function: u8,
    node_id: Option<u8>,
    callback_id: Option<u8>,
    stage: TransactionStage,
    done: Sender<bool>,
}

/// Handle the sender blocks on.
#[derive(Debug)]
pub struct Completion {
    rx: Receiver<bool>,
}

impl Completion {
    /// Default resolution timeout.
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Block until the transaction resolves; `false` on failure or timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).unwrap_or(false)
    }
}

/// Mutex-guarded single in-flight request slot.
///
/// `begin` is only ever called from the queue worker, which serializes
/// sends; `update` is called from the receive path.
#[derive(Debug, Default)]
pub struct PendingSlot {
    inner: Mutex<Option<Pending>>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly written request and return the waiter handle.
    ///
    /// A second `begin` while a request is pending fails the older one;
    /// the single queue worker makes this unreachable in practice.
    pub fn begin(&self, message: &Message) -> Completion {
        let (tx, rx) = bounded(1);
        let pending = Pending {
            function: message.function,
            node_id: message.node_id,
            callback_id: message.callback_id,
            stage: TransactionStage::WaitAck,
            done: tx,
        };
        let mut slot = self.inner.lock();
        if let Some(old) = slot.replace(pending) {
            log::warn!(
                "transaction for function 0x{:02X} displaced while pending",
                old.function
            );
            let _ = old.done.try_send(false);
        }
        Completion { rx }
    }

    /// Whether a request is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Current stage, `Idle` when nothing is pending.
    pub fn stage(&self) -> TransactionStage {
        self.inner
            .lock()
            .as_ref()
            .map_or(TransactionStage::Idle, |p| p.stage)
    }

    /// Node id and callback id of the pending request, for responses whose
    /// layout carries neither.
    pub fn pending_ids(&self) -> Option<(Option<u8>, Option<u8>)> {
        self.inner
            .lock()
            .as_ref()
            .map(|p| (p.node_id, p.callback_id))
    }

    /// Feed a parsed inbound message into the state machine.
    ///
    /// Returns `true` when the message belonged to the pending transaction
    /// (and advanced or resolved it).
    pub fn update(&self, message: &Message) -> bool {
        let mut slot = self.inner.lock();
        let pending = match slot.as_mut() {
            Some(p) => p,
            None => return false,
        };
        if message.function != pending.function {
            return false;
        }

        match message.message_type {
            MessageType::Response => {
                // a zero return value means the transceiver refused to
                // queue the frame; no callback will follow
                if pending.function == FUNC_SEND_DATA
                    && message.callback_status == Some(0x00)
                {
                    pending.stage = TransactionStage::Error;
                    return Self::resolve(&mut slot, false);
                }
                if pending.callback_id.is_some() {
                    log::trace!(
                        "function 0x{:02X}: response received, awaiting callback",
                        pending.function
                    );
                    pending.stage = TransactionStage::SendDataReady;
                    true
                } else {
                    pending.stage = TransactionStage::Complete;
                    Self::resolve(&mut slot, true)
                }
            }
            MessageType::Request => {
                // callback for our request; a mismatched callback id belongs
                // to a stale transaction and is ignored
                if let (Some(expected), Some(actual)) =
                    (pending.callback_id, message.callback_id)
                {
                    if expected != actual {
                        log::debug!(
                            "function 0x{:02X}: callback id {} does not match pending {}",
                            message.function,
                            actual,
                            expected
                        );
                        return false;
                    }
                }
                let ok = message.callback_status == Some(TRANSMIT_COMPLETE_OK);
                pending.stage = if ok {
                    TransactionStage::Complete
                } else {
                    TransactionStage::Error
                };
                Self::resolve(&mut slot, ok)
            }
        }
    }

    /// A CAN frame forces `Error` regardless of stage.
    pub fn cancel(&self) {
        let mut slot = self.inner.lock();
        if let Some(pending) = slot.as_mut() {
            log::warn!(
                "transceiver cancelled transaction for function 0x{:02X}",
                pending.function
            );
            pending.stage = TransactionStage::Error;
            Self::resolve(&mut slot, false);
        }
    }

    /// Fail and clear the slot (transport write failure, timeout).
    pub fn fail(&self) {
        let mut slot = self.inner.lock();
        if slot.as_mut().is_some() {
            Self::resolve(&mut slot, false);
        }
    }

    fn resolve(slot: &mut Option<Pending>, ok: bool) -> bool {
        if let Some(pending) = slot.take() {
            let _ = pending.done.try_send(ok);
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
