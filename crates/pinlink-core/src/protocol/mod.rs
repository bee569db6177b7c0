//! Device wire protocol: message types and the JSON envelope codec.

pub mod codec;
pub mod messages;
pub mod pins;

pub use codec::{decode_envelope, encode_envelope, ProtocolError};
pub use messages::{Action, Envelope, Header, IdBand, PinMode, Update};
