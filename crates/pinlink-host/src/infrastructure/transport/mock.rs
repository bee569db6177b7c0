//! Scripted transport for tests.
//!
//! [`ScriptedTransport`] records every frame handed to it and lets the test
//! decide when the link opens, fails, drops, or delivers a frame.  Clones
//! share state, so a test keeps one clone and gives the other to the
//! session.
//!
//! ```rust
//! use pinlink_host::infrastructure::transport::{ScriptedTransport, Transport};
//! use tokio::sync::mpsc;
//!
//! let (tx, _rx) = mpsc::unbounded_channel();
//! let wire = ScriptedTransport::new();
//! let mut transport = wire.clone();
//! transport.open("ws://device", 1, tx);
//! wire.connect();
//! transport.send("{}".to_string()).unwrap();
//! assert_eq!(wire.frames(), vec!["{}".to_string()]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use pinlink_core::{decode_envelope, Envelope};
use tokio::sync::mpsc::UnboundedSender;

use super::{Transport, TransportError, TransportEvent, TransportEventKind};

#[derive(Default)]
struct ScriptState {
    open: bool,
    auto_connect: bool,
    generation: u64,
    events: Option<UnboundedSender<TransportEvent>>,
    open_calls: Vec<(String, u64)>,
    frames: Vec<String>,
    close_count: usize,
}

/// A [`Transport`] whose lifecycle is driven by the test.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("lock poisoned")
    }

    /// A transport that reports `Connected` as soon as it is opened.
    pub fn auto_connecting() -> Self {
        let transport = Self::new();
        transport.lock().auto_connect = true;
        transport
    }

    /// Opens the link of the latest `open` call.
    pub fn connect(&self) {
        let mut state = self.lock();
        state.open = true;
        emit(&state, TransportEventKind::Connected);
    }

    /// Fails the latest connection attempt.
    pub fn fail_connect(&self, reason: &str) {
        let mut state = self.lock();
        state.open = false;
        emit(&state, TransportEventKind::ConnectFailed(reason.to_string()));
    }

    /// Closes the link from the device side.
    pub fn drop_link(&self, code: u16, reason: &str) {
        let mut state = self.lock();
        state.open = false;
        emit(
            &state,
            TransportEventKind::Disconnected {
                code,
                reason: reason.to_string(),
            },
        );
    }

    /// Delivers one inbound frame.
    pub fn deliver(&self, frame: &str) {
        let state = self.lock();
        emit(&state, TransportEventKind::MessageReceived(frame.as_bytes().to_vec()));
    }

    /// Every frame sent so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.lock().frames.clone()
    }

    /// Every frame sent so far, decoded.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .filter_map(|frame| decode_envelope(frame.as_bytes()).ok())
            .collect()
    }

    /// Forgets recorded frames.
    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    /// `(address, generation)` of every `open` call.
    pub fn open_calls(&self) -> Vec<(String, u64)> {
        self.lock().open_calls.clone()
    }

    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Generation of the latest `open` call.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

fn emit(state: &ScriptState, kind: TransportEventKind) {
    if let Some(events) = &state.events {
        // A dropped receiver means the session is gone.
        let _ = events.send(TransportEvent {
            generation: state.generation,
            kind,
        });
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, address: &str, generation: u64, events: UnboundedSender<TransportEvent>) {
        let mut state = self.lock();
        state.open_calls.push((address.to_string(), generation));
        state.generation = generation;
        state.events = Some(events);
        state.open = state.auto_connect;
        if state.auto_connect {
            emit(&state, TransportEventKind::Connected);
        }
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        state.frames.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.open = false;
        state.close_count += 1;
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_send_before_connect_is_not_connected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = ScriptedTransport::new();
        transport.open("ws://device", 1, tx);

        assert_eq!(transport.send("x".into()), Err(TransportError::NotConnected));
    }

    #[test]
    fn test_events_carry_open_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let wire = ScriptedTransport::new();
        let mut transport = wire.clone();
        transport.open("ws://device", 7, tx);

        wire.connect();
        wire.drop_link(1006, "gone");

        assert_eq!(rx.try_recv().unwrap().generation, 7);
        assert_eq!(
            rx.try_recv().unwrap().kind,
            TransportEventKind::Disconnected {
                code: 1006,
                reason: "gone".into()
            }
        );
        assert!(!wire.is_open());
    }

    #[test]
    fn test_auto_connecting_opens_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = ScriptedTransport::auto_connecting();
        transport.open("ws://device", 1, tx);

        assert!(transport.is_open());
        assert_eq!(rx.try_recv().unwrap().kind, TransportEventKind::Connected);
    }
}
