//! Application layer for pinlink-host.
//!
//! Orchestrates one device session: it knows *what* to send and *when* to
//! reconnect, and delegates the socket work to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Serializing user calls and network events through [`SessionState`]
//! - Running the outbound gate and the pending-outbound queue
//! - Owning the reconnection timer ([`ReconnectController`])
//! - Hosting extensions ([`ExtensionRegistry`])
//!
//! # What does NOT belong here?
//!
//! - WebSocket framing and handshakes (infrastructure)
//! - Throttling and backoff policy itself (`pinlink-core`)

pub mod error;
pub mod extension;
pub mod outbound_queue;
pub mod reconnect;
pub mod session;
pub mod state;

pub use error::SessionError;
pub use extension::{Extension, ExtensionRegistry, SessionLink};
pub use outbound_queue::OutboundQueue;
pub use reconnect::{ReconnectController, RetryDue, ScheduledRetry};
pub use session::Session;
pub use state::{ConnectionStatus, SessionState, WriteOptions};
