//! Session configuration.
//!
//! [`SessionConfig`] carries every tunable knob of a device session.  It is a
//! plain struct with no file or environment access; the host crate fills it
//! from a TOML file or CLI flags.

use std::time::Duration;

use crate::domain::backoff::ReconnectPolicy;
use crate::domain::demux::{InboundDemux, KindMismatchPolicy};
use crate::protocol::messages::PROTOCOL_VERSION;

/// All runtime settings for one session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pinlink_core::SessionConfig;
///
/// let cfg = SessionConfig::default();
/// assert_eq!(cfg.outbound_interval, Duration::from_millis(100));
/// assert_eq!(cfg.reconnect.max_attempts, 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Default minimum time between two transmitted writes on one pin.
    pub outbound_interval: Duration,

    /// Default polling interval requested from the device for read pins.
    pub read_interval: Duration,

    /// Default analog write threshold.  A write is sent only when it differs
    /// from the last sent value by more than this.
    pub analog_threshold: u32,

    pub reconnect: ReconnectPolicy,

    /// How inbound reports for a pin registered with another kind are
    /// handled.
    pub kind_mismatch: KindMismatchPolicy,

    /// Version written into every outbound envelope header.
    pub protocol_version: u32,
}

impl Default for SessionConfig {
    /// | Field              | Default      |
    /// |--------------------|--------------|
    /// | outbound_interval  | 100 ms       |
    /// | read_interval      | 200 ms       |
    /// | analog_threshold   | 2            |
    /// | reconnect          | see [`ReconnectPolicy`] |
    /// | kind_mismatch      | `Overwrite`  |
    /// | protocol_version   | 1            |
    fn default() -> Self {
        Self {
            outbound_interval: Duration::from_millis(100),
            read_interval: Duration::from_millis(200),
            analog_threshold: 2,
            reconnect: ReconnectPolicy::default(),
            kind_mismatch: KindMismatchPolicy::Overwrite,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl SessionConfig {
    /// The inbound demultiplexer matching this configuration.
    pub fn demux(&self) -> InboundDemux {
        InboundDemux::new(self.kind_mismatch, self.read_interval)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
