//! Infrastructure layer for pinlink-host.
//!
//! Everything that touches the outside world: the WebSocket link to the
//! device and the TOML config file.

pub mod config_file;
pub mod transport;

pub use config_file::{ConfigError, ConfigFile};
pub use transport::{Transport, TransportError, TransportEvent, TransportEventKind, WebSocketTransport};
