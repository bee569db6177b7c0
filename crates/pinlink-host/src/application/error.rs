//! Session error type.

use pinlink_core::ProtocolError;
use thiserror::Error;

use crate::infrastructure::transport::TransportError;

/// Errors produced by the session layer.
///
/// None of these stop the session: after a give-up the session keeps serving
/// cached reads and queueing sends until the user reconnects.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Automatic reconnection was abandoned.
    #[error("gave up reconnecting after {attempts} attempts")]
    MaxReconnectAttemptsExceeded { attempts: u32 },

    /// An extension is already attached under this name.
    #[error("an extension named '{0}' is already attached")]
    DuplicateExtension(String),

    /// `reconnect()` was called before any `connect()`.
    #[error("no device address; call connect() first")]
    NoAddress,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
