//! Domain layer for pinlink.
//!
//! Pure policy with no I/O: the per-pin [`event::Event`] record, the
//! [`registry::EventRegistry`] that owns one event per pin, the outbound
//! [`gate::OutboundGate`], the [`demux::InboundDemux`], and the reconnection
//! [`backoff::ReconnectStateMachine`].
//!
//! Code in outer layers (the host session, the WebSocket transport) depends on
//! this module; this module never depends on them.

pub mod backoff;
pub mod config;
pub mod demux;
pub mod event;
pub mod gate;
pub mod registry;
