//! Driver orchestration: receive pipeline, bootstrap, node operations.
//!
//! One receive thread polls the transport and feeds bytes through the
//! incremental frame decoder; the send-queue worker serializes outbound
//! transactions. Everything shared between those paths (pending request
//! slot, node registry, duplicate-suppression window) sits behind explicit
//! locks in [`DriverInner`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use zwave_classes::management::WakeUp;
use zwave_classes::{ids, security, ClassEvent, ClassRegistry, Decoded};
use zwave_model::{NodeRegistry, RegistrySnapshot};
use zwave_proto::{
    FrameDecoder, FrameEncoder, Message, MessageType, SerialFrame, ACK, FUNC_ADD_NODE_TO_NETWORK,
    FUNC_APPLICATION_COMMAND_HANDLER, FUNC_APPLICATION_UPDATE, FUNC_GET_CAPABILITIES,
    FUNC_GET_INIT_DATA, FUNC_GET_NODE_PROTOCOL_INFO, FUNC_GET_VERSION, FUNC_IS_FAILED_NODE,
    FUNC_MEMORY_GET_ID, FUNC_REMOVE_FAILED_NODE, FUNC_REMOVE_NODE_FROM_NETWORK,
    FUNC_REPLACE_FAILED_NODE, FUNC_REQUEST_NODE_INFO, FUNC_REQUEST_NODE_NEIGHBOR_UPDATE,
    FUNC_SEND_DATA, MSG_TYPE_REQUEST, NAK, NODE_OPTION_ANY, NODE_OPTION_STOP,
    NODE_STATUS_ADDING_CONTROLLER, NODE_STATUS_ADDING_SLAVE, NODE_STATUS_DONE,
    NODE_STATUS_FAILED, NODE_STATUS_LEARN_READY, NODE_STATUS_NODE_FOUND,
    NODE_STATUS_PROTOCOL_DONE, TRANSMIT_OPTION_ACK, TRANSMIT_OPTION_AUTO_ROUTE,
    UPDATE_STATE_NODE_INFO_RECEIVED,
};

use crate::error::DriverError;
use crate::events::{DriverEvent, OperationStatus};
use crate::queue::{QueueDriver, SendHandle, SendQueue};
use crate::transaction::{Completion, PendingSlot};
use crate::transport::Transport;

/// Identical inbound frames inside this window are discarded as duplicates.
const DUPLICATE_WINDOW: Duration = Duration::from_secs(2);
/// How long the receive thread blocks per transport poll.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Heal callback statuses.
const NEIGHBOR_UPDATE_STARTED: u8 = 0x21;
const NEIGHBOR_UPDATE_DONE: u8 = 0x22;
const NEIGHBOR_UPDATE_FAILED: u8 = 0x23;

/// Functions whose progress arrives as a stream of status callbacks rather
/// than a single transmit-complete transaction. These are written
/// fire-and-forget; their callbacks surface as progress events.
const SESSION_FUNCTIONS: [u8; 4] = [
    FUNC_ADD_NODE_TO_NETWORK,
    FUNC_REMOVE_NODE_FROM_NETWORK,
    FUNC_REQUEST_NODE_NEIGHBOR_UPDATE,
    FUNC_REMOVE_FAILED_NODE,
];

// ============================================================================
// Configuration
// ============================================================================

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Port identifier handed to the transport on connect.
    pub port: String,
    /// Delay applied after every processed queue entry (floor 100ms).
    pub inter_command_delay: Duration,
    /// Node-table snapshot file, loaded on connect and saved on disconnect.
    pub snapshot_path: Option<PathBuf>,
    /// 16-byte network key for the security sub-protocol.
    pub network_key: [u8; 16],
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            port: String::new(),
            inter_command_delay: Duration::from_millis(100),
            snapshot_path: None,
            network_key: [0u8; 16],
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct DriverInner {
    config: DriverConfig,
    transport: Mutex<Box<dyn Transport>>,
    encoder: Mutex<FrameEncoder>,
    decoder: Mutex<FrameDecoder>,
    pending: PendingSlot,
    registry: Mutex<NodeRegistry>,
    classes: ClassRegistry,
    events: Sender<DriverEvent>,
    /// Last fully parsed data frame with its arrival time.
    last_frame: Mutex<Option<(Vec<u8>, Instant)>>,
    /// Active network key; the configured key unless a snapshot overrides it.
    network_key: Mutex<[u8; 16]>,
    controller_id: AtomicU8,
    controller_version: Mutex<Option<String>>,
    disposing: AtomicBool,
    queue: Mutex<Option<SendQueue>>,
}

impl DriverInner {
    fn emit(&self, event: DriverEvent) {
        let _ = self.events.send(event);
    }

    fn write_raw(&self, bytes: &[u8]) -> bool {
        self.transport.lock().write(bytes)
    }

    /// Encode and enqueue one outbound function call.
    fn send_function(
        &self,
        function: u8,
        payload: &[u8],
        want_callback: bool,
        node_id: Option<u8>,
        command_class: Option<u8>,
    ) -> Result<SendHandle, DriverError> {
        let (frame, callback_id) =
            self.encoder
                .lock()
                .encode(MSG_TYPE_REQUEST, function, payload, want_callback)?;
        let message = Message::outbound(frame, function, node_id, callback_id, command_class);
        self.enqueue_message(message)
    }

    /// Build and enqueue a SendData frame carrying an application payload.
    fn send_data(&self, node_id: u8, data: &[u8]) -> Result<SendHandle, DriverError> {
        let mut payload = Vec::with_capacity(3 + data.len());
        payload.push(node_id);
        payload.push(data.len() as u8);
        payload.extend_from_slice(data);
        payload.push(TRANSMIT_OPTION_ACK | TRANSMIT_OPTION_AUTO_ROUTE);
        self.send_function(
            FUNC_SEND_DATA,
            &payload,
            true,
            Some(node_id),
            data.first().copied(),
        )
    }

    /// FIFO append, with sleeping-node diversion for application sends.
    fn enqueue_message(&self, message: Message) -> Result<SendHandle, DriverError> {
        if self.disposing.load(Ordering::SeqCst) {
            return Err(DriverError::Disposed);
        }
        let queue = self.queue.lock();
        let queue = match queue.as_ref() {
            Some(q) => q,
            None => return Err(DriverError::NotConnected),
        };
        if message.command_class.is_some() {
            if let Some(node_id) = message.node_id {
                let sleeping = self
                    .registry
                    .lock()
                    .node(node_id)
                    .map(WakeUp::is_sleeping)
                    .unwrap_or(false);
                if sleeping {
                    return Ok(queue.divert(message));
                }
            }
        }
        Ok(queue.enqueue(message))
    }

    // ------------------------------------------------------------------
    // Receive pipeline
    // ------------------------------------------------------------------

    fn feed(&self, bytes: &[u8]) {
        let frames = {
            let mut decoder = self.decoder.lock();
            decoder.push(bytes);
            let mut frames = Vec::new();
            while let Some(frame) = decoder.decode() {
                frames.push(frame);
            }
            frames
        };
        for frame in frames {
            self.process_frame(frame);
        }
    }

    fn process_frame(&self, frame: SerialFrame) {
        match frame {
            SerialFrame::Ack => {
                log::trace!("rx ACK");
            }
            SerialFrame::Nak => {
                log::warn!("rx NAK, failing pending transaction");
                self.pending.fail();
            }
            SerialFrame::Can => {
                self.pending.cancel();
            }
            SerialFrame::BadChecksum(bytes) => {
                log::warn!("rx bad checksum in {}, replying NAK", hex::encode(&bytes));
                self.write_raw(&[NAK]);
            }
            SerialFrame::Data(bytes) => self.handle_data(bytes),
        }
    }

    fn handle_data(&self, frame: Vec<u8>) {
        if self.is_duplicate(&frame) {
            log::debug!("rx duplicate frame {}, dropped", hex::encode(&frame));
            return;
        }
        self.write_raw(&[ACK]);

        let mut message = match Message::parse(&frame) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("unparseable frame {}: {}", hex::encode(&frame), e);
                return;
            }
        };

        // a response whose layout carries no node id belongs to the request
        // we are currently waiting on
        if message.message_type == MessageType::Response && message.node_id.is_none() {
            if let Some((node_id, callback_id)) = self.pending.pending_ids() {
                message.node_id = node_id;
                if message.callback_id.is_none() {
                    message.callback_id = callback_id;
                }
            }
        }

        self.pending.update(&message);
        self.dispatch(&message);
    }

    fn is_duplicate(&self, frame: &[u8]) -> bool {
        let mut last = self.last_frame.lock();
        let duplicate = matches!(
            last.as_ref(),
            Some((bytes, at)) if bytes == frame && at.elapsed() < DUPLICATE_WINDOW
        );
        if !duplicate {
            *last = Some((frame.to_vec(), Instant::now()));
        }
        duplicate
    }

    fn dispatch(&self, message: &Message) {
        match (message.message_type, message.function) {
            (MessageType::Response, FUNC_GET_VERSION) => self.handle_version(message),
            (MessageType::Response, FUNC_MEMORY_GET_ID) => self.handle_memory_get_id(message),
            (MessageType::Response, FUNC_GET_CAPABILITIES) => {
                log::info!("serial API capabilities: {}", hex::encode(message.payload()));
            }
            (MessageType::Response, FUNC_GET_INIT_DATA) => self.handle_init_data(message),
            (MessageType::Response, FUNC_GET_NODE_PROTOCOL_INFO) => {
                self.handle_protocol_info(message)
            }
            (MessageType::Response, FUNC_IS_FAILED_NODE) => {
                let failed = message.payload().first() == Some(&0x01);
                if let Some(node_id) = message.node_id {
                    log::info!("node {}: failed-node check: {}", node_id, failed);
                    self.emit(DriverEvent::NodeOperationProgress {
                        node_id,
                        status: if failed {
                            OperationStatus::Failed
                        } else {
                            OperationStatus::Done
                        },
                    });
                }
            }
            (MessageType::Request, FUNC_APPLICATION_UPDATE) => self.handle_application_update(message),
            (MessageType::Request, FUNC_APPLICATION_COMMAND_HANDLER) => {
                self.handle_application_command(message)
            }
            (MessageType::Request, FUNC_ADD_NODE_TO_NETWORK) => {
                self.handle_membership(message, true)
            }
            (MessageType::Request, FUNC_REMOVE_NODE_FROM_NETWORK) => {
                self.handle_membership(message, false)
            }
            (MessageType::Request, FUNC_REQUEST_NODE_NEIGHBOR_UPDATE) => self.handle_heal(message),
            (MessageType::Request, FUNC_REMOVE_FAILED_NODE)
            | (MessageType::Request, FUNC_REPLACE_FAILED_NODE) => {
                if let Some(status) = message.callback_status {
                    self.emit(DriverEvent::NodeOperationProgress {
                        node_id: message.node_id.unwrap_or(0),
                        status: if status == 0x01 {
                            OperationStatus::Done
                        } else {
                            OperationStatus::Failed
                        },
                    });
                }
            }
            _ => {
                log::trace!(
                    "no dispatch for {:?} function 0x{:02X}",
                    message.message_type,
                    message.function
                );
            }
        }
    }

    fn handle_version(&self, message: &Message) {
        let payload = message.payload();
        let text: Vec<u8> = payload
            .iter()
            .copied()
            .take_while(|&b| b != 0x00)
            .collect();
        let version = String::from_utf8_lossy(&text).trim().to_string();
        log::info!("controller library: {}", version);
        *self.controller_version.lock() = Some(version);
    }

    fn handle_memory_get_id(&self, message: &Message) {
        // payload: [homeId:4][nodeId]
        if let Some(&node_id) = message.payload().get(4) {
            log::info!(
                "home id {}, controller node {}",
                hex::encode(&message.payload()[..4]),
                node_id
            );
            self.controller_id.store(node_id, Ordering::SeqCst);
        }
    }

    fn handle_init_data(&self, message: &Message) {
        // payload: [version][capabilities][bitmaskLen][bitmask…][chipType][chipVersion]
        let payload = message.payload();
        if payload.len() < 3 {
            return;
        }
        let len = payload[2] as usize;
        let bitmask = match payload.get(3..3 + len) {
            Some(b) => b,
            None => {
                log::warn!("init data bitmask truncated");
                return;
            }
        };

        let controller_id = self.controller_id.load(Ordering::SeqCst);
        let created = self.registry.lock().populate_from_bitmask(bitmask, controller_id);
        log::info!("initial node bitmask named {} node(s)", created.len());
        for node_id in created {
            self.emit(DriverEvent::DiscoveryProgress {
                node_id,
                complete: false,
            });
            let _ = self.send_function(
                FUNC_GET_NODE_PROTOCOL_INFO,
                &[node_id],
                false,
                Some(node_id),
                None,
            );
            let _ = self.send_function(FUNC_REQUEST_NODE_INFO, &[node_id], false, Some(node_id), None);
        }
    }

    fn handle_protocol_info(&self, message: &Message) {
        // payload: [capability][security][reserved][basic][generic][specific]
        let node_id = match message.node_id {
            Some(id) => id,
            None => return,
        };
        let payload = message.payload();
        if payload.len() < 6 {
            return;
        }
        let mut registry = self.registry.lock();
        registry.create_node(node_id, payload[4]);
        if let Some(node) = registry.node_mut(node_id) {
            node.basic_type = payload[3];
            node.generic_type = payload[4];
            node.specific_type = payload[5];
        }
    }

    fn handle_application_update(&self, message: &Message) {
        // payload: [status][nodeId][nifLen][basic][generic][specific][classes…]
        let payload = message.payload();
        if payload.len() < 2 {
            return;
        }
        let status = payload[0];
        let node_id = payload[1];
        if status != UPDATE_STATE_NODE_INFO_RECEIVED {
            log::debug!("application update status 0x{:02X} for node {}", status, node_id);
            return;
        }
        if payload.len() < 6 {
            return;
        }
        let nif_len = payload[2] as usize;
        // classes follow the three device-type bytes inside the nif
        let classes_len = nif_len.saturating_sub(3).min(payload.len() - 6);
        let classes = &payload[6..6 + classes_len];

        {
            let mut registry = self.registry.lock();
            registry.create_node(node_id, payload[4]);
            if let Some(node) = registry.node_mut(node_id) {
                node.basic_type = payload[3];
                node.generic_type = payload[4];
                node.specific_type = payload[5];
                node.update_node_info(classes);
            }
        }
        log::info!(
            "node {}: node info frame with {} class(es)",
            node_id,
            classes.len()
        );
        self.emit(DriverEvent::DiscoveryProgress {
            node_id,
            complete: true,
        });
    }

    fn handle_application_command(&self, message: &Message) {
        // payload: [rxStatus][srcNode][cmdLen][class][command][args…]
        let payload = message.payload();
        if payload.len() < 4 {
            return;
        }
        let node_id = payload[1];
        let cmd_len = payload[2] as usize;
        let app = match payload.get(3..3 + cmd_len) {
            Some(app) if !app.is_empty() => app.to_vec(),
            _ => {
                log::warn!("node {}: truncated application payload", node_id);
                return;
            }
        };

        let controller_id = self.controller_id.load(Ordering::SeqCst);
        let mut events: Vec<Decoded> = Vec::new();
        let mut replies: Vec<Vec<u8>> = Vec::new();
        {
            let mut registry = self.registry.lock();
            registry.create_node(node_id, 0);
            let node = match registry.node_mut(node_id) {
                Some(node) => node,
                None => return,
            };

            if app[0] == ids::SECURITY {
                match security::handle(node, &app, controller_id) {
                    Ok(outcome) => {
                        events.extend(outcome.events);
                        replies.extend(outcome.replies);
                        for inner in outcome.decrypted {
                            events.extend(self.classes.dispatch(node, &inner));
                        }
                    }
                    Err(e) => {
                        log::warn!("node {}: security payload dropped: {}", node_id, e);
                    }
                }
            } else {
                events.extend(self.classes.dispatch(node, &app));
            }
        }

        for reply in replies {
            if let Err(e) = self.send_data(node_id, &reply) {
                log::warn!("node {}: failed to queue security reply: {}", node_id, e);
            }
        }

        let woke = events
            .iter()
            .any(|d| matches!(d.event, ClassEvent::WakeUpNotification));
        if woke {
            if let Some(queue) = self.queue.lock().as_ref() {
                queue.flush_node(node_id);
            }
        }

        if !events.is_empty() {
            self.emit(DriverEvent::NodeUpdated { node_id, events });
        }
    }

    fn handle_membership(&self, message: &Message, adding: bool) {
        let status = match message.callback_status {
            Some(s) => s,
            None => return,
        };
        let node_id = message.node_id.unwrap_or(0);
        let function = message.function;

        match status {
            NODE_STATUS_LEARN_READY => {
                self.emit(DriverEvent::NodeOperationProgress {
                    node_id: 0,
                    status: OperationStatus::Started,
                });
            }
            NODE_STATUS_NODE_FOUND => {
                self.emit(DriverEvent::NodeOperationProgress {
                    node_id,
                    status: OperationStatus::InProgress,
                });
            }
            NODE_STATUS_ADDING_SLAVE | NODE_STATUS_ADDING_CONTROLLER => {
                if adding && node_id != 0 {
                    // payload: [cb][status][node][nifLen][basic][generic][specific][classes…]
                    let payload = message.payload();
                    let mut registry = self.registry.lock();
                    registry.create_node(node_id, payload.get(5).copied().unwrap_or(0));
                    if let (Some(node), Some(nif_len)) =
                        (registry.node_mut(node_id), payload.get(3))
                    {
                        let classes_len =
                            (*nif_len as usize).saturating_sub(3).min(payload.len().saturating_sub(7));
                        node.basic_type = payload.get(4).copied().unwrap_or(0);
                        node.generic_type = payload.get(5).copied().unwrap_or(0);
                        node.specific_type = payload.get(6).copied().unwrap_or(0);
                        if classes_len > 0 {
                            let classes = payload[7..7 + classes_len].to_vec();
                            node.update_node_info(&classes);
                        }
                    }
                }
                self.emit(DriverEvent::NodeOperationProgress {
                    node_id,
                    status: OperationStatus::InProgress,
                });
            }
            NODE_STATUS_PROTOCOL_DONE => {
                // leave learn mode
                let _ = self.send_function(function, &[NODE_OPTION_STOP], true, None, None);
            }
            NODE_STATUS_DONE => {
                if !adding && node_id != 0 {
                    self.registry.lock().remove_node(node_id);
                    log::info!("node {}: excluded from the network", node_id);
                }
                self.emit(DriverEvent::NodeOperationProgress {
                    node_id,
                    status: OperationStatus::Done,
                });
                if adding && node_id != 0 {
                    self.maybe_enroll_security(node_id);
                }
            }
            NODE_STATUS_FAILED => {
                let _ = self.send_function(function, &[NODE_OPTION_STOP], true, None, None);
                self.emit(DriverEvent::NodeOperationProgress {
                    node_id,
                    status: OperationStatus::Failed,
                });
            }
            other => {
                log::debug!("membership callback status 0x{:02X}", other);
            }
        }
    }

    /// Start secure enrollment for a freshly included node that advertises
    /// the security class.
    fn maybe_enroll_security(&self, node_id: u8) {
        let key = *self.network_key.lock();
        let scheme_get = {
            let mut registry = self.registry.lock();
            match registry.node_mut(node_id) {
                Some(node) if node.supports_command_class(ids::SECURITY) => {
                    Some(security::begin_enrollment(node, key))
                }
                _ => None,
            }
        };
        if let Some(payload) = scheme_get {
            log::info!("node {}: starting secure enrollment", node_id);
            if let Err(e) = self.send_data(node_id, &payload) {
                log::warn!("node {}: failed to queue scheme get: {}", node_id, e);
            }
        }
    }

    fn handle_heal(&self, message: &Message) {
        let node_id = message.node_id.unwrap_or(0);
        let status = match message.callback_status {
            Some(s) => s,
            None => return,
        };
        let status = match status {
            NEIGHBOR_UPDATE_STARTED => OperationStatus::InProgress,
            NEIGHBOR_UPDATE_DONE => OperationStatus::Done,
            NEIGHBOR_UPDATE_FAILED => OperationStatus::Failed,
            other => {
                log::debug!("neighbor update status 0x{:02X}", other);
                return;
            }
        };
        self.emit(DriverEvent::HealProgress { node_id, status });
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn load_snapshot(&self) {
        let path = match &self.config.snapshot_path {
            Some(p) if p.exists() => p.clone(),
            _ => return,
        };
        match RegistrySnapshot::load(&path).and_then(|s| s.restore()) {
            Ok((registry, key)) => {
                log::info!("restored {} node(s) from {}", registry.len(), path.display());
                *self.network_key.lock() = key;
                let mut guard = self.registry.lock();
                *guard = registry;
                // restored secure nodes need their session key re-seeded
                for id in guard.ids() {
                    if let Some(node) = guard.node_mut(id) {
                        if node.supports_command_class(ids::SECURITY)
                            || node.is_secured_command_class(ids::SECURITY)
                        {
                            node.data.security_mut().network_key = key;
                        }
                    }
                }
            }
            Err(e) => {
                // fall back to an empty registry; discovery will rebuild it
                log::warn!("snapshot load failed ({}), starting empty", e);
            }
        }
    }

    fn save_snapshot(&self) {
        let path = match &self.config.snapshot_path {
            Some(p) => p.clone(),
            None => return,
        };
        let key = *self.network_key.lock();
        let controller_id = self.controller_id.load(Ordering::SeqCst);
        let snapshot = {
            let registry = self.registry.lock();
            RegistrySnapshot::capture(&registry, controller_id, &key)
        };
        if let Err(e) = snapshot.save(&path) {
            log::warn!("snapshot save failed: {}", e);
        }
    }
}

impl QueueDriver for DriverInner {
    fn send_message(&self, message: &Message) -> bool {
        if self.disposing.load(Ordering::SeqCst) {
            return false;
        }
        log::trace!(
            "tx function 0x{:02X}: {}",
            message.function,
            hex::encode(&message.raw)
        );

        // session-style functions report progress through callbacks, not a
        // transmit-complete transaction
        if SESSION_FUNCTIONS.contains(&message.function) {
            return self.write_raw(&message.raw);
        }

        let completion = self.pending.begin(message);
        if !self.write_raw(&message.raw) {
            log::warn!("transport write failed for function 0x{:02X}", message.function);
            self.pending.fail();
            return false;
        }
        let ok = completion.wait(Completion::TIMEOUT);
        if !ok {
            self.pending.fail();
        }
        ok
    }

    fn keep_for_wakeup(&self, message: &Message) -> bool {
        let node_id = match message.node_id {
            Some(id) => id,
            None => return false,
        };
        if message.command_class.is_none() {
            return false;
        }
        let registry = self.registry.lock();
        match registry.node(node_id) {
            Some(node) => {
                node.supports_command_class(ids::WAKE_UP)
                    && !node.data.get_flag(WakeUp::ALWAYS_AWAKE_KEY)
            }
            None => false,
        }
    }

    fn report_failure(&self, message: &Message) {
        let node_id = match message.node_id {
            Some(id) => id,
            None => return,
        };
        // an application send that exhausts its retries against a
        // wake-up-capable node marks the node asleep, so later sends divert
        // at enqueue time instead of burning the retry cycle again
        if message.command_class.is_some() {
            let mut registry = self.registry.lock();
            if let Some(node) = registry.node_mut(node_id) {
                if node.supports_command_class(ids::WAKE_UP)
                    && !node.data.get_flag(WakeUp::ALWAYS_AWAKE_KEY)
                {
                    log::info!("node {}: unreachable after retries, assuming asleep", node_id);
                    WakeUp::set_sleeping(node, true);
                }
            }
        }
        self.emit(DriverEvent::NodeOperationProgress {
            node_id,
            status: OperationStatus::Failed,
        });
    }
}

// ============================================================================
// Public driver
// ============================================================================

/// The Z-Wave serial driver.
///
/// Construct with a transport and configuration, `connect`, then use the
/// operation methods; typed node events arrive on the receiver returned by
/// [`Driver::new`].
pub struct Driver {
    inner: Arc<DriverInner>,
    rx_thread: Option<JoinHandle<()>>,
    connected: bool,
}

impl Driver {
    /// Create a driver and its event channel.
    pub fn new(transport: Box<dyn Transport>, config: DriverConfig) -> (Self, Receiver<DriverEvent>) {
        let (tx, rx) = unbounded();
        let network_key = config.network_key;
        let inner = Arc::new(DriverInner {
            config,
            transport: Mutex::new(transport),
            encoder: Mutex::new(FrameEncoder::new()),
            decoder: Mutex::new(FrameDecoder::new()),
            pending: PendingSlot::new(),
            registry: Mutex::new(NodeRegistry::new()),
            classes: ClassRegistry::new(),
            events: tx,
            last_frame: Mutex::new(None),
            network_key: Mutex::new(network_key),
            controller_id: AtomicU8::new(zwave_proto::CONTROLLER_NODE_ID),
            controller_version: Mutex::new(None),
            disposing: AtomicBool::new(false),
            queue: Mutex::new(None),
        });
        (
            Driver {
                inner,
                rx_thread: None,
                connected: false,
            },
            rx,
        )
    }

    /// Open the transport, start the worker threads, and begin the
    /// controller bootstrap sequence.
    pub fn connect(&mut self) -> Result<(), DriverError> {
        if self.connected {
            return Ok(());
        }
        let port = self.inner.config.port.clone();
        self.inner.transport.lock().open(&port)?;
        self.inner.disposing.store(false, Ordering::SeqCst);
        self.inner.load_snapshot();

        let queue_driver: Arc<dyn QueueDriver> = self.inner.clone();
        let queue = SendQueue::start(queue_driver, self.inner.config.inter_command_delay);
        *self.inner.queue.lock() = Some(queue);

        let rx_inner = Arc::clone(&self.inner);
        self.rx_thread = thread::Builder::new()
            .name("zwave-receive".into())
            .spawn(move || {
                while !rx_inner.disposing.load(Ordering::SeqCst) {
                    let bytes = rx_inner.transport.lock().poll(POLL_INTERVAL);
                    if let Some(bytes) = bytes {
                        rx_inner.feed(&bytes);
                    }
                }
            })
            .ok();

        self.connected = true;
        self.inner.emit(DriverEvent::ControllerStatusChanged { connected: true });

        // bootstrap: identify the controller, then enumerate the network
        self.inner.send_function(FUNC_GET_VERSION, &[], false, None, None)?;
        self.inner.send_function(FUNC_MEMORY_GET_ID, &[], false, None, None)?;
        self.inner.send_function(FUNC_GET_CAPABILITIES, &[], false, None, None)?;
        self.inner.send_function(FUNC_GET_INIT_DATA, &[], false, None, None)?;
        Ok(())
    }

    /// Persist the node table, stop the workers, and close the transport.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.inner.save_snapshot();
        self.inner.disposing.store(true, Ordering::SeqCst);
        if let Some(mut queue) = self.inner.queue.lock().take() {
            queue.shutdown();
        }
        if let Some(handle) = self.rx_thread.take() {
            let _ = handle.join();
        }
        self.inner.transport.lock().close();
        self.connected = false;
        self.inner.emit(DriverEvent::ControllerStatusChanged { connected: false });
    }

    /// Send an application payload (`[class][command][args…]`) to a node.
    ///
    /// Payloads for classes the node secures are routed through the
    /// security sub-protocol (queued behind a nonce exchange) instead of
    /// being sent in the clear.
    pub fn send_application(&self, node_id: u8, payload: Vec<u8>) -> Result<SendHandle, DriverError> {
        let class = match payload.first() {
            Some(&c) => c,
            None => return Err(DriverError::EmptyPayload),
        };
        let secured = {
            let mut registry = self.inner.registry.lock();
            let node = registry
                .node_mut(node_id)
                .ok_or(DriverError::UnknownNode(node_id))?;
            if node.is_secured_command_class(class) {
                Some(security::queue_secured(node, payload.clone()))
            } else {
                None
            }
        };
        match secured {
            Some(Some(nonce_get)) => self.inner.send_data(node_id, &nonce_get),
            Some(None) => {
                // nonce request already outstanding; the payload rides along
                Ok(SendHandle::resolved(true))
            }
            None => self.inner.send_data(node_id, &payload),
        }
    }

    /// Ask a node for its node information frame.
    pub fn request_node_info(&self, node_id: u8) -> Result<SendHandle, DriverError> {
        self.inner
            .send_function(FUNC_REQUEST_NODE_INFO, &[node_id], false, Some(node_id), None)
    }

    /// Enter inclusion mode.
    pub fn begin_add_node(&self) -> Result<SendHandle, DriverError> {
        self.inner
            .send_function(FUNC_ADD_NODE_TO_NETWORK, &[NODE_OPTION_ANY], true, None, None)
    }

    /// Leave inclusion mode.
    pub fn cancel_add_node(&self) -> Result<SendHandle, DriverError> {
        self.inner
            .send_function(FUNC_ADD_NODE_TO_NETWORK, &[NODE_OPTION_STOP], true, None, None)
    }

    /// Enter exclusion mode.
    pub fn begin_remove_node(&self) -> Result<SendHandle, DriverError> {
        self.inner.send_function(
            FUNC_REMOVE_NODE_FROM_NETWORK,
            &[NODE_OPTION_ANY],
            true,
            None,
            None,
        )
    }

    /// Leave exclusion mode.
    pub fn cancel_remove_node(&self) -> Result<SendHandle, DriverError> {
        self.inner.send_function(
            FUNC_REMOVE_NODE_FROM_NETWORK,
            &[NODE_OPTION_STOP],
            true,
            None,
            None,
        )
    }

    /// Ask a node to rediscover its neighbors (heal).
    pub fn heal_node(&self, node_id: u8) -> Result<SendHandle, DriverError> {
        self.inner.send_function(
            FUNC_REQUEST_NODE_NEIGHBOR_UPDATE,
            &[node_id],
            true,
            Some(node_id),
            None,
        )
    }

    /// Check whether the controller has a node on its failed list.
    pub fn is_node_failed(&self, node_id: u8) -> Result<SendHandle, DriverError> {
        self.inner
            .send_function(FUNC_IS_FAILED_NODE, &[node_id], false, Some(node_id), None)
    }

    /// Remove a node from the network via the failed-node list.
    pub fn remove_failed_node(&self, node_id: u8) -> Result<SendHandle, DriverError> {
        self.inner
            .send_function(FUNC_REMOVE_FAILED_NODE, &[node_id], true, Some(node_id), None)
    }

    /// Node ids currently known to the registry.
    pub fn node_ids(&self) -> Vec<u8> {
        self.inner.registry.lock().ids()
    }

    /// Run a closure against one node, if it exists.
    pub fn with_node<R>(&self, node_id: u8, f: impl FnOnce(&zwave_model::Node) -> R) -> Option<R> {
        self.inner.registry.lock().node(node_id).map(f)
    }

    /// Run a closure against one node mutably, if it exists.
    pub fn with_node_mut<R>(
        &self,
        node_id: u8,
        f: impl FnOnce(&mut zwave_model::Node) -> R,
    ) -> Option<R> {
        self.inner.registry.lock().node_mut(node_id).map(f)
    }

    /// Controller library version string, once the bootstrap has answered.
    pub fn controller_version(&self) -> Option<String> {
        self.inner.controller_version.lock().clone()
    }

    /// The controller's own node id.
    pub fn controller_id(&self) -> u8 {
        self.inner.controller_id.load(Ordering::SeqCst)
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.disconnect();
    }
}
