//! Transport abstraction for the device link.
//!
//! A [`Transport`] moves text frames to and from the device and reports
//! lifecycle changes as [`TransportEvent`]s on a channel supplied by the
//! session.  It holds no retry logic and no protocol knowledge: the session
//! decides what to send and when to reconnect.
//!
//! Every [`Transport::open`] call carries a *generation* number that is
//! stamped onto every event of that connection.  When the session replaces a
//! connection (manual reconnect, retry), events still in flight from the old
//! one carry a stale generation and are ignored.
//!
//! # Implementations
//!
//! | Type                  | Use                                        |
//! |-----------------------|--------------------------------------------|
//! | [`WebSocketTransport`] | Production: tokio-tungstenite client      |
//! | [`ScriptedTransport`]  | Tests: records frames, lifecycle driven by the test |

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub mod mock;
pub mod websocket;

pub use mock::ScriptedTransport;
pub use websocket::WebSocketTransport;

/// Errors returned by [`Transport::send`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// There is no open link.  The caller queues the frame.
    #[error("transport is not connected")]
    NotConnected,

    /// The link could not be established or broke while sending.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// A lifecycle change or an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// Generation of the [`Transport::open`] call this event belongs to.
    pub generation: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The link is open; frames may be sent.
    Connected,
    /// The attempt failed before the link opened.
    ConnectFailed(String),
    /// An open link closed.  `code` is the WebSocket close code (1006 when
    /// the link broke without a close frame).
    Disconnected { code: u16, reason: String },
    /// One inbound frame, undecoded.
    MessageReceived(Vec<u8>),
}

/// The seam between the session and the network.
///
/// All methods are synchronous and must return promptly; implementations do
/// their I/O on their own tasks.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Starts a connection attempt to `address`.
    ///
    /// Exactly one of [`TransportEventKind::Connected`] or
    /// [`TransportEventKind::ConnectFailed`] must follow on `events`, tagged
    /// with `generation`.  Any previous link is closed first.
    fn open(&mut self, address: &str, generation: u64, events: UnboundedSender<TransportEvent>);

    /// Hands one text frame to the link.  Fire-and-forget.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when no link is open.
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the link.  Calling it on a closed transport is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
