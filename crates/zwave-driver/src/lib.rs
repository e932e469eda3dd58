//! Host-side driver engine for the Z-Wave serial API.
//!
//! This crate ties the wire layer ([`zwave_proto`]), the node model
//! ([`zwave_model`]), and the command-class codecs ([`zwave_classes`])
//! together into a running driver:
//!
//! - [`transaction`]: the one-in-flight transaction state machine
//! - [`queue`]: the send-queue worker with retries and sleeping-node
//!   diversion
//! - [`transport`]: the abstract duplex byte channel boundary
//! - [`driver`]: orchestration, bootstrap, discovery, and node operations
//! - [`events`]: the event stream delivered to the embedding application
//!
//! ## Threads
//!
//! Three contexts touch shared state: the transport receive thread, the
//! send-queue worker, and caller threads issuing commands. All shared
//! mutable state (pending request, node registry, outbound queue, per-node
//! sessions) is lock-guarded; callers block on per-message completion
//! channels rather than polling.

pub mod driver;
pub mod error;
pub mod events;
pub mod queue;
pub mod transaction;
pub mod transport;

pub use driver::{Driver, DriverConfig};
pub use error::DriverError;
pub use events::{DriverEvent, OperationStatus};
pub use queue::{SendHandle, SendQueue};
pub use transaction::{Completion, PendingSlot, TransactionStage};
pub use transport::{data_frame, MockHandle, MockTransport, Transport};
