//! Transport boundary: the abstract duplex byte channel.
//!
//! The driver never touches a serial device directly; it talks to a
//! [`Transport`] implementation. Production code wraps a serial port,
//! tests use [`MockTransport`] with scripted responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::DriverError;

/// A duplex byte channel to the transceiver.
///
/// `write` reports success as a boolean (a failed write fails the current
/// transaction, it is not an API error). `poll` blocks up to `timeout` for
/// received bytes; implementations should use short timeouts so the receive
/// loop can observe shutdown.
pub trait Transport: Send {
    /// Open the channel to the given port identifier.
    fn open(&mut self, port: &str) -> Result<(), DriverError>;

    /// Close the channel. Idempotent.
    fn close(&mut self);

    /// Write raw bytes; `false` on any transport failure.
    fn write(&mut self, bytes: &[u8]) -> bool;

    /// Block up to `timeout` for received bytes; `None` when nothing arrived.
    fn poll(&mut self, timeout: Duration) -> Option<Vec<u8>>;
}

// ============================================================================
// Mock transport
// ============================================================================

#[derive(Default)]
struct MockInner {
    open: bool,
    /// Every frame the driver wrote, in order.
    written: Vec<Vec<u8>>,
    /// Bytes waiting to be returned from `poll`.
    rx: VecDeque<Vec<u8>>,
    /// Scripted replies keyed by the function id of the written frame.
    /// Each written data frame with a matching function id pops one script
    /// entry and queues its frames for `poll`.
    scripts: HashMap<u8, VecDeque<Vec<Vec<u8>>>>,
    /// Reply ACK to every written data frame.
    auto_ack: bool,
    /// Answer every written SendData frame with a success response and a
    /// transmit-complete callback echoing the frame's callback id.
    complete_send_data: bool,
    /// Writes fail when set.
    fail_writes: bool,
}

/// In-memory transport with scripted responses, for tests.
///
/// Cloneable handle semantics: [`MockTransport::handle`] returns a
/// [`MockHandle`] sharing the same state, so a test can inject frames and
/// inspect writes while the driver owns the transport.
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    /// Create a mock that ACKs every written data frame.
    pub fn new() -> Self {
        let inner = MockInner {
            auto_ack: true,
            ..MockInner::default()
        };
        MockTransport {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// A handle sharing this transport's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, _port: &str) -> Result<(), DriverError> {
        self.inner.lock().open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.inner.lock().open = false;
    }

    fn write(&mut self, bytes: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open || inner.fail_writes {
            return false;
        }
        inner.written.push(bytes.to_vec());

        // control bytes (ACK/NAK replies from the driver) trigger no script
        if bytes.len() < 4 || bytes[0] != zwave_proto::SOF {
            return true;
        }
        if inner.auto_ack {
            inner.rx.push_back(vec![zwave_proto::ACK]);
        }
        let function = bytes[3];
        if function == zwave_proto::FUNC_SEND_DATA && inner.complete_send_data {
            let callback_id = bytes[bytes.len() - 2];
            inner.rx.push_back(data_frame(
                zwave_proto::MSG_TYPE_RESPONSE,
                zwave_proto::FUNC_SEND_DATA,
                &[0x01],
            ));
            inner.rx.push_back(data_frame(
                zwave_proto::MSG_TYPE_REQUEST,
                zwave_proto::FUNC_SEND_DATA,
                &[callback_id, zwave_proto::TRANSMIT_COMPLETE_OK],
            ));
        }
        if let Some(queue) = inner.scripts.get_mut(&function) {
            if let Some(frames) = queue.pop_front() {
                for frame in frames {
                    inner.rx.push_back(frame);
                }
            }
        }
        true
    }

    fn poll(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(bytes) = self.inner.lock().rx.pop_front() {
                return Some(bytes);
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Test-side handle to a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

impl MockHandle {
    /// Script the frames to queue for `poll` when a data frame with the
    /// given function id is written. Consecutive writes of the same
    /// function consume consecutive scripts.
    pub fn script_reply(&self, function: u8, frames: Vec<Vec<u8>>) {
        self.inner
            .lock()
            .scripts
            .entry(function)
            .or_default()
            .push_back(frames);
    }

    /// Inject unsolicited bytes, as if the device sent them.
    pub fn inject(&self, bytes: Vec<u8>) {
        self.inner.lock().rx.push_back(bytes);
    }

    /// Drain and return everything written so far.
    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.inner.lock().written)
    }

    /// Data frames (SOF only) written so far, without draining.
    pub fn written_data_frames(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .written
            .iter()
            .filter(|f| f.first() == Some(&zwave_proto::SOF))
            .cloned()
            .collect()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Disable/enable automatic ACK replies to written data frames.
    pub fn set_auto_ack(&self, auto_ack: bool) {
        self.inner.lock().auto_ack = auto_ack;
    }

    /// Answer every SendData write with success response + OK callback.
    pub fn auto_complete_send_data(&self, enabled: bool) {
        self.inner.lock().complete_send_data = enabled;
    }
}

/// Build a checksummed SOF frame for scripted replies.
pub fn data_frame(msg_type: u8, function: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = vec![zwave_proto::SOF, (body.len() + 3) as u8, msg_type, function];
    frame.extend_from_slice(body);
    frame.push(zwave_proto::checksum(&frame[1..]));
    frame
}
