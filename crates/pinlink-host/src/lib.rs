//! pinlink-host library crate.
//!
//! Drives the pins of a microcontroller over a WebSocket.  A [`Session`]
//! keeps a local cache of every pin, sends writes only when they change
//! enough to matter, answers reads from the values the device reports, and
//! reconnects with exponential backoff when the link drops.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Host program
//!         ↕
//! [pinlink-host]
//!   ├── application/      Session facade, driver task, retry timers
//!   ├── extensions/       Custom devices (NeoPixel strips)
//!   └── infrastructure/
//!         ├── transport/  WebSocket client (tokio-tungstenite)
//!         └── config_file TOML settings
//!         ↕
//! Device firmware  (JSON envelopes over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - Throttling, caching and backoff policy live in `pinlink-core` and are
//!   pure.
//! - `application` owns the state and timers and reaches the network only
//!   through the [`Transport`](infrastructure::Transport) trait.
//! - `infrastructure` depends on `tokio` and `tungstenite`.

/// Application layer: the session and its driver.
pub mod application;

/// Extension devices addressed by id 200 and above.
pub mod extensions;

/// Infrastructure layer: WebSocket transport and config file.
pub mod infrastructure;

pub use application::{ConnectionStatus, Extension, Session, SessionError, SessionLink, WriteOptions};
