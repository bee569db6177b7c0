//! JSON codec for pinlink envelopes.
//!
//! Wire format: one JSON document per WebSocket text frame.
//! ```text
//! {"header":{"version":1},"data":[{"id":13,"action":2,"params":[1]}]}
//! ```
//! Message boundaries come from the WebSocket framing, so unlike a stream
//! codec there is no length prefix and no partial-message state.

use thiserror::Error;

use crate::protocol::messages::Envelope;

/// Errors that can occur during envelope encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The received bytes are not a valid envelope (bad JSON, missing header,
    /// non-integer params, and so on).
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Encodes an [`Envelope`] into its JSON text form.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use pinlink_core::protocol::{encode_envelope, Envelope, Update};
///
/// let env = Envelope::single(1, Update::digital_write(13, 1));
/// let text = encode_envelope(&env).unwrap();
/// assert_eq!(text, r#"{"header":{"version":1},"data":[{"id":13,"action":2,"params":[1]}]}"#);
/// ```
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes one [`Envelope`] from a received frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEnvelope`] if the bytes are not a
/// well-formed envelope.  The caller drops the frame and carries on.
///
/// # Examples
///
/// ```rust
/// use pinlink_core::protocol::{decode_envelope, Action};
///
/// let env = decode_envelope(br#"{"header":{"version":1},"data":[{"id":14,"action":5,"params":[512]}]}"#).unwrap();
/// assert_eq!(env.data[0].action, Action::AnalogRead);
/// assert_eq!(env.data[0].value(), Some(512));
/// ```
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
