//! The session facade.
//!
//! [`Session`] is the handle a host program holds.  It is cheap to clone and
//! every method takes `&self`, locks the [`SessionState`] briefly, and returns
//! without waiting on the network.  Reads answer from the cache.
//!
//! A driver task spawned at construction receives transport events and
//! retry-timer firings and applies them under the same lock, so user calls
//! and network events are serialized.
//!
//! ```rust,no_run
//! use pinlink_core::{protocol::pins, PinMode, SessionConfig};
//! use pinlink_host::Session;
//!
//! # async fn sketch() {
//! let session = Session::new(SessionConfig::default());
//! session.connect("ws://192.168.4.1:81");
//! session.configure_pin(pins::D6, PinMode::AnalogOutput, None);
//! session.configure_pin(pins::A0, PinMode::AnalogInput, None);
//!
//! // Once per frame:
//! let level = session.analog_read(pins::A0);
//! session.analog_write(pins::D6, f64::from(level) / 4.0);
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use pinlink_core::{GateDecision, PinId, PinMode, SessionConfig, Update};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::SessionError;
use super::extension::{Extension, ExtensionRegistry, SessionLink};
use super::reconnect::RetryDue;
use super::state::{ConnectionStatus, SessionState, WriteOptions};
use crate::infrastructure::transport::{Transport, TransportEvent, WebSocketTransport};

pub(crate) struct SessionInner {
    state: Mutex<SessionState>,
    extensions: Mutex<ExtensionRegistry>,
}

impl SessionInner {
    /// A panic while holding the lock leaves the state consistent enough to
    /// keep going, so poisoning is ignored.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_extensions(&self) -> MutexGuard<'_, ExtensionRegistry> {
        self.extensions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to one device session.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a session that talks WebSocket.  Must be called inside a Tokio
    /// runtime.  Nothing connects until [`connect`](Self::connect).
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, Box::new(WebSocketTransport::new()))
    }

    /// Creates a session over any [`Transport`].  Must be called inside a
    /// Tokio runtime.
    pub fn with_transport(config: SessionConfig, transport: Box<dyn Transport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let inner = Arc::new(SessionInner {
            state: Mutex::new(SessionState::new(id, config, transport, events_tx, timer_tx)),
            extensions: Mutex::new(ExtensionRegistry::new()),
        });

        tokio::spawn(drive(id, Arc::downgrade(&inner), events_rx, timer_rx));
        debug!("session {id}: created");

        Self { id, inner }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ── Connection ───────────────────────────────────────────────────────────

    /// Starts connecting to `address` (e.g. `ws://192.168.4.1:81`).  Returns
    /// immediately; writes made before the link opens are queued.
    pub fn connect(&self, address: &str) {
        self.inner.lock_state().connect(address);
    }

    /// Closes the link and turns automatic reconnection off until the next
    /// [`connect`](Self::connect) or [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        self.inner.lock_state().disconnect();
    }

    /// Drops the current link and connects again with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoAddress`] if [`connect`](Self::connect) was never
    /// called.
    pub fn reconnect(&self) -> Result<(), SessionError> {
        self.inner.lock_state().reconnect()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock_state().status()
    }

    /// Envelopes waiting for the link.
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending_len()
    }

    // ── Pins ─────────────────────────────────────────────────────────────────

    /// Sets a pin's mode.  For input modes, the first read afterwards asks
    /// the device to report every `interval` (default: the session's read
    /// interval).
    pub fn configure_pin(&self, pin: PinId, mode: PinMode, interval: Option<Duration>) {
        self.inner.lock_state().configure_pin(pin, mode, interval);
    }

    pub fn digital_write(&self, pin: PinId, value: i32) -> GateDecision {
        self.digital_write_with(pin, value, WriteOptions::default())
    }

    pub fn digital_write_with(&self, pin: PinId, value: i32, options: WriteOptions) -> GateDecision {
        self.inner
            .lock_state()
            .digital_write(pin, value, options, Instant::now())
    }

    pub fn analog_write(&self, pin: PinId, value: f64) -> GateDecision {
        self.analog_write_with(pin, value, WriteOptions::default())
    }

    pub fn analog_write_with(&self, pin: PinId, value: f64, options: WriteOptions) -> GateDecision {
        self.inner
            .lock_state()
            .analog_write(pin, value, options, Instant::now())
    }

    /// Latest reported level of `pin`, `0` until the device has reported.
    pub fn digital_read(&self, pin: PinId) -> i32 {
        self.inner.lock_state().digital_read(pin, None, Instant::now())
    }

    pub fn digital_read_every(&self, pin: PinId, interval: Duration) -> i32 {
        self.inner
            .lock_state()
            .digital_read(pin, Some(interval), Instant::now())
    }

    /// Latest reported value of `pin`, `0` until the device has reported.
    pub fn analog_read(&self, pin: PinId) -> i32 {
        self.inner.lock_state().analog_read(pin, None, Instant::now())
    }

    pub fn analog_read_every(&self, pin: PinId, interval: Duration) -> i32 {
        self.inner
            .lock_state()
            .analog_read(pin, Some(interval), Instant::now())
    }

    pub fn stop(&self, pin: PinId) {
        self.inner.lock_state().stop(pin);
    }

    /// Sends raw updates in one envelope without throttling.
    pub fn send(&self, updates: Vec<Update>) {
        self.inner.lock_state().send(updates);
    }

    // ── Extensions ───────────────────────────────────────────────────────────

    /// Attaches `extension` under `name` and returns a shared handle to it.
    ///
    /// # Errors
    ///
    /// [`SessionError::DuplicateExtension`] if `name` is already taken.
    pub fn attach<E: Extension>(&self, name: &str, mut extension: E) -> Result<Arc<Mutex<E>>, SessionError> {
        let mut extensions = self.inner.lock_extensions();
        if extensions.contains(name) {
            return Err(SessionError::DuplicateExtension(name.to_string()));
        }
        extension.attached(self.link());
        let device_id = extension.device_id();
        let handle = Arc::new(Mutex::new(extension));
        extensions.insert(name, Arc::clone(&handle))?;
        info!("session {}: attached extension '{name}' (device {device_id})", self.id);
        Ok(handle)
    }

    /// The extension attached as `name`, if it is an `E`.
    pub fn extension<E: Extension>(&self, name: &str) -> Option<Arc<Mutex<E>>> {
        self.inner.lock_extensions().get::<E>(name)
    }

    /// A weak sending handle, as given to extensions.
    pub fn link(&self) -> SessionLink {
        SessionLink::new(Arc::downgrade(&self.inner))
    }
}

/// Applies transport events and retry firings until the session is dropped.
async fn drive(
    id: Uuid,
    inner: Weak<SessionInner>,
    mut events: UnboundedReceiver<TransportEvent>,
    mut timers: UnboundedReceiver<RetryDue>,
) {
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.lock_state().handle_transport_event(event, Instant::now());
            }
            Some(due) = timers.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.lock_state().handle_retry_due(due);
            }
            else => break,
        }
    }
    debug!("session {id}: driver stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::ScriptedTransport;
    use pinlink_core::ConnectionState;
    use tokio_test::{assert_err, assert_ok};

    const ADDRESS: &str = "ws://device";

    async fn settle(session: &Session) {
        for _ in 0..100 {
            if session.status().connected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_driver_applies_connected_event() {
        let wire = ScriptedTransport::auto_connecting();
        let session = Session::with_transport(SessionConfig::default(), Box::new(wire.clone()));

        session.connect(ADDRESS);
        settle(&session).await;

        let status = session.status();
        assert!(status.connected);
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.address.as_deref(), Some(ADDRESS));
    }

    #[tokio::test]
    async fn test_writes_before_connect_are_flushed_by_driver() {
        let wire = ScriptedTransport::auto_connecting();
        let session = Session::with_transport(SessionConfig::default(), Box::new(wire.clone()));
        session.digital_write(2, 1);
        session.digital_write(3, 1);
        assert_eq!(session.pending_len(), 2);

        session.connect(ADDRESS);
        settle(&session).await;

        assert_eq!(session.pending_len(), 0);
        let ids: Vec<u16> = wire.envelopes().iter().map(|e| e.data[0].id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_inbound_frame_reaches_read_cache() {
        let wire = ScriptedTransport::auto_connecting();
        let session = Session::with_transport(SessionConfig::default(), Box::new(wire.clone()));
        session.connect(ADDRESS);
        settle(&session).await;

        wire.deliver(r#"{"header":{"version":1},"data":[{"id":2,"action":3,"params":[1]}]}"#);
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.digital_read(2), 1);
    }

    #[tokio::test]
    async fn test_reconnect_requires_prior_connect() {
        let session = Session::with_transport(SessionConfig::default(), Box::new(ScriptedTransport::new()));
        assert_err!(session.reconnect());

        session.connect(ADDRESS);
        assert_ok!(session.reconnect());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let session = Session::with_transport(SessionConfig::default(), Box::new(ScriptedTransport::new()));
        let other = session.clone();

        other.digital_write(13, 1);

        assert_eq!(session.pending_len(), 1);
        assert_eq!(session.id(), other.id());
    }
}
