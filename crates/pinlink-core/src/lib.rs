//! # pinlink-core
//!
//! Shared library for pinlink containing the device wire protocol, the per-pin
//! event registry, and the throttling and reconnection policies.
//!
//! This crate has zero dependencies on sockets, async runtimes, or timers.
//! Every time-dependent decision takes the current [`std::time::Instant`] as
//! an argument, so the whole policy layer can be tested deterministically.
//!
//! # Architecture overview
//!
//! pinlink lets a host program drive and observe the pins of a
//! microcontroller (an Arduino UNO R4 WiFi or an ESP32 running the matching
//! firmware) over a WebSocket.  This crate defines:
//!
//! - **`protocol`** – What travels over the wire.  Each transmission is one
//!   JSON *envelope* holding a list of *updates*
//!   (`{ id, action, params }`).
//!
//! - **`domain`** – Pure policy.  The [`EventRegistry`] holds one [`Event`]
//!   per pin; the [`OutboundGate`] decides which writes are worth sending;
//!   the [`InboundDemux`] folds received updates into the registry; the
//!   [`ReconnectStateMachine`] decides when to retry a dropped link.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pinlink_core::EventRegistry` instead of the full module path.
pub use domain::backoff::{ConnectionState, ReconnectDecision, ReconnectPolicy, ReconnectStateMachine};
pub use domain::config::SessionConfig;
pub use domain::demux::{DemuxReport, InboundDemux, KindMismatchPolicy};
pub use domain::event::{Event, EventKind, PinId};
pub use domain::gate::{GateDecision, OutboundGate, WriteRequest};
pub use domain::registry::{EventRegistry, Registration};
pub use protocol::codec::{decode_envelope, encode_envelope, ProtocolError};
pub use protocol::messages::{Action, Envelope, Header, IdBand, PinMode, Update};
