//! Serialized session core.
//!
//! [`SessionState`] owns everything one device session mutates: the event
//! registry, the pending-outbound queue, the transport, and the reconnection
//! controller.  The [`Session`](super::Session) facade keeps it behind a
//! single mutex and feeds it user calls and driver events; nothing in here
//! awaits.
//!
//! Every time-dependent method takes `now` so tests can replay exact
//! timelines.
//!
//! # Send path
//!
//! ```text
//! write ─► OutboundGate ─► Envelope ─► connected? ─► transport.send()
//!                                          │               │ NotConnected
//!                                          ▼               ▼
//!                                     OutboundQueue ◄──────┘
//! ```
//!
//! When the link opens, the queue is drained front to back before anything
//! submitted later, and a submission made while envelopes are still queued
//! triggers a flush first, so per-session order is strictly FIFO.

use std::time::{Duration, Instant};

use pinlink_core::{
    decode_envelope, domain::gate::round_analog, encode_envelope, ConnectionState, DemuxReport,
    Envelope, EventKind, EventRegistry, GateDecision, IdBand, InboundDemux, OutboundGate, PinId, PinMode,
    ReconnectDecision, SessionConfig, Update, WriteRequest,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::SessionError;
use super::outbound_queue::OutboundQueue;
use super::reconnect::{ReconnectController, RetryDue};
use crate::infrastructure::transport::{Transport, TransportEvent, TransportEventKind};

/// Per-call overrides for a write.  `None` keeps the pin's current setting,
/// or the session default for a pin that has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub interval: Option<Duration>,
    pub threshold: Option<u32>,
}

impl WriteOptions {
    pub fn interval(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub reconnecting: bool,
    /// Retries since the last successful connection.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Address of the last `connect()`.
    pub address: Option<String>,
    /// Envelopes waiting for the link.
    pub pending: usize,
}

pub struct SessionState {
    id: Uuid,
    config: SessionConfig,
    registry: EventRegistry,
    gate: OutboundGate,
    demux: InboundDemux,
    queue: OutboundQueue,
    transport: Box<dyn Transport>,
    reconnect: ReconnectController,
    address: Option<String>,
    /// Incremented on every open and on disconnect; events tagged with an
    /// older generation are ignored.
    generation: u64,
    events_tx: UnboundedSender<TransportEvent>,
}

impl SessionState {
    pub fn new(
        id: Uuid,
        config: SessionConfig,
        transport: Box<dyn Transport>,
        events_tx: UnboundedSender<TransportEvent>,
        timer_tx: UnboundedSender<RetryDue>,
    ) -> Self {
        Self {
            id,
            demux: config.demux(),
            reconnect: ReconnectController::new(config.reconnect, timer_tx),
            config,
            registry: EventRegistry::new(),
            gate: OutboundGate,
            queue: OutboundQueue::new(),
            transport,
            address: None,
            generation: 0,
            events_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self) -> ConnectionStatus {
        let machine = self.reconnect.machine();
        ConnectionStatus {
            state: machine.state(),
            connected: machine.is_connected(),
            reconnecting: machine.is_reconnecting(),
            attempts: machine.attempts(),
            max_attempts: machine.policy().max_attempts,
            address: self.address.clone(),
            pending: self.queue.len(),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────────────

    pub fn connect(&mut self, address: &str) {
        if self.reconnect.machine().is_connected() && self.address.as_deref() == Some(address) {
            debug!("session {}: already connected to {address}", self.id);
            return;
        }
        info!("session {}: connecting to {address}", self.id);
        self.address = Some(address.to_string());
        self.reconnect.begin_connect();
        self.open_link();
    }

    pub fn disconnect(&mut self) {
        info!("session {}: disconnecting", self.id);
        self.reconnect.manual_disconnect();
        self.generation += 1;
        self.transport.close();
    }

    /// Drops the current link (if any) and connects again immediately with a
    /// fresh retry budget.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoAddress`] if `connect()` was never called.
    pub fn reconnect(&mut self) -> Result<(), SessionError> {
        let address = self.address.clone().ok_or(SessionError::NoAddress)?;
        info!("session {}: manual reconnect to {address}", self.id);
        self.reconnect.manual_reconnect();
        self.open_link();
        Ok(())
    }

    fn open_link(&mut self) {
        let Some(address) = self.address.clone() else {
            return;
        };
        self.generation += 1;
        self.transport.close();
        self.transport
            .open(&address, self.generation, self.events_tx.clone());
    }

    /// Applies one event from the transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        if event.generation != self.generation {
            debug!(
                "session {}: ignoring event from superseded connection {} (current {})",
                self.id, event.generation, self.generation
            );
            return;
        }

        match event.kind {
            TransportEventKind::Connected => {
                info!("session {}: connected", self.id);
                self.reconnect.on_connected();
                self.flush_pending();
            }
            TransportEventKind::ConnectFailed(reason) => {
                warn!("session {}: connection attempt failed: {reason}", self.id);
                self.handle_link_lost(true);
            }
            TransportEventKind::Disconnected { code, reason } => {
                info!("session {}: link closed ({code}) {reason}", self.id);
                self.handle_link_lost(false);
            }
            TransportEventKind::MessageReceived(bytes) => {
                self.handle_inbound(&bytes, now);
            }
        }
    }

    /// Applies a fired retry timer.
    pub fn handle_retry_due(&mut self, due: RetryDue) {
        if self.reconnect.on_retry_due(due) {
            info!(
                "session {}: retrying connection (attempt {})",
                self.id,
                self.reconnect.machine().attempts()
            );
            self.open_link();
        }
    }

    fn handle_link_lost(&mut self, attempt_failed: bool) {
        match self.reconnect.on_link_lost(attempt_failed) {
            ReconnectDecision::Retry { attempt, delay } => {
                info!(
                    "session {}: reconnect attempt {attempt}/{} in {delay:?}",
                    self.id,
                    self.reconnect.machine().policy().max_attempts
                );
            }
            ReconnectDecision::GiveUp { attempts } => {
                error!(
                    "session {}: {}",
                    self.id,
                    SessionError::MaxReconnectAttemptsExceeded { attempts }
                );
            }
            ReconnectDecision::AlreadyScheduled => {
                debug!("session {}: retry already scheduled", self.id);
            }
            ReconnectDecision::Suppressed => {
                debug!("session {}: automatic reconnect is off", self.id);
            }
        }
    }

    /// Decodes one inbound frame and folds it into the registry.  Malformed
    /// frames are logged and dropped.
    pub fn handle_inbound(&mut self, bytes: &[u8], now: Instant) -> Option<DemuxReport> {
        let envelope = match decode_envelope(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("session {}: dropping inbound frame: {e}", self.id);
                return None;
            }
        };
        if envelope.header.version != self.config.protocol_version {
            debug!(
                "session {}: inbound envelope has version {} (expected {}); applying anyway",
                self.id, envelope.header.version, self.config.protocol_version
            );
        }
        let report = self.demux.apply(&mut self.registry, &envelope, now);
        debug!("session {}: inbound {report:?}", self.id);
        Some(report)
    }

    // ── Pin operations ───────────────────────────────────────────────────────

    /// Configures a pin on the device.  Always transmitted; resets the pin's
    /// event so the next write is delivered unconditionally and the next
    /// read registers the pin for reports.  For input modes `interval` is the
    /// report interval that registration will ask for.
    pub fn configure_pin(&mut self, pin: PinId, mode: PinMode, interval: Option<Duration>) {
        let kind = EventKind::from_mode(mode);
        let interval = interval.unwrap_or(if mode.is_input() {
            self.config.read_interval
        } else {
            self.config.outbound_interval
        });
        let threshold = if kind == EventKind::AnalogWrite {
            self.config.analog_threshold
        } else {
            0
        };

        self.registry.configure(pin, kind, interval, threshold);

        debug!("session {}: pin {pin} mode {mode:?}", self.id);
        self.transmit(Envelope::single(self.config.protocol_version, Update::pin_mode(pin, mode)));
    }

    pub fn digital_write(&mut self, pin: PinId, value: i32, options: WriteOptions, now: Instant) -> GateDecision {
        let request = self.write_request(pin, EventKind::DigitalWrite, value, options);
        self.write(request, now)
    }

    /// Analog values are rounded to the nearest integer before the change
    /// check.
    pub fn analog_write(&mut self, pin: PinId, value: f64, options: WriteOptions, now: Instant) -> GateDecision {
        let request = self.write_request(pin, EventKind::AnalogWrite, round_analog(value), options);
        self.write(request, now)
    }

    fn write_request(&self, pin: PinId, kind: EventKind, value: i32, options: WriteOptions) -> WriteRequest {
        let existing = self.registry.get(pin).filter(|e| e.kind == kind);
        let default_threshold = if kind == EventKind::AnalogWrite {
            self.config.analog_threshold
        } else {
            0
        };
        WriteRequest {
            pin,
            kind,
            value,
            interval: options
                .interval
                .or_else(|| existing.map(|e| e.interval))
                .unwrap_or(self.config.outbound_interval),
            threshold: options
                .threshold
                .or_else(|| existing.map(|e| e.threshold))
                .unwrap_or(default_threshold),
        }
    }

    fn write(&mut self, request: WriteRequest, now: Instant) -> GateDecision {
        let decision = self.gate.admit(&mut self.registry, &request, now);
        if decision.is_send() {
            let update = Update::new(request.pin, request.kind.action(), vec![request.value]);
            self.transmit(Envelope::single(self.config.protocol_version, update));
        } else {
            debug!(
                "session {}: pin {} write {} {decision:?}",
                self.id, request.pin, request.value
            );
        }
        decision
    }

    pub fn digital_read(&mut self, pin: PinId, interval: Option<Duration>, now: Instant) -> i32 {
        self.read(pin, EventKind::DigitalRead, interval, now)
    }

    pub fn analog_read(&mut self, pin: PinId, interval: Option<Duration>, now: Instant) -> i32 {
        self.read(pin, EventKind::AnalogRead, interval, now)
    }

    /// Returns the cached value, registering the pin with the device first
    /// when needed.  Without an explicit `interval` the pin keeps the one it
    /// was configured or registered with.  An explicitly changed interval is
    /// re-registered only once the previously registered interval has
    /// elapsed.
    fn read(&mut self, pin: PinId, kind: EventKind, interval: Option<Duration>, now: Instant) -> i32 {
        let existing = self.registry.get(pin).filter(|e| e.kind == kind);
        let interval = interval
            .or_else(|| existing.map(|e| e.interval))
            .unwrap_or(self.config.read_interval);

        if let Some(event) = existing.filter(|e| e.active) {
            if let Some(last) = event.last_update {
                let refresh =
                    event.interval != interval && now.saturating_duration_since(last) >= event.interval;
                if !refresh {
                    return event.value_or_default();
                }
            }
        }

        let (event, _) = self.registry.upsert(pin, kind, interval, 0);
        event.last_update = Some(now);
        event.active = true;
        let value = event.value_or_default();

        let update = match kind {
            EventKind::DigitalRead => Update::digital_read(pin, interval),
            _ => Update::analog_read(pin, interval),
        };
        debug!("session {}: registering {kind:?} on pin {pin} every {interval:?}", self.id);
        self.transmit(Envelope::single(self.config.protocol_version, update));
        value
    }

    /// Stops whatever the device is doing with `pin`.
    pub fn stop(&mut self, pin: PinId) {
        self.registry.mark_inactive(pin);
        self.transmit(Envelope::single(self.config.protocol_version, Update::stop(pin)));
    }

    /// Sends raw updates in one envelope, bypassing the gate.
    pub fn send(&mut self, updates: Vec<Update>) {
        if updates.is_empty() {
            return;
        }
        for update in &updates {
            if IdBand::of(update.id) == IdBand::Reserved {
                warn!(
                    "session {}: sending to reserved id {}; the device will likely ignore it",
                    self.id, update.id
                );
            }
        }
        self.transmit(Envelope::new(self.config.protocol_version, updates));
    }

    // ── Outbound plumbing ────────────────────────────────────────────────────

    fn transmit(&mut self, envelope: Envelope) {
        if !self.reconnect.machine().is_connected() {
            self.queue.push(envelope);
            debug!("session {}: link down, {} envelope(s) queued", self.id, self.queue.len());
            return;
        }

        if !self.queue.is_empty() {
            self.flush_pending();
            if !self.queue.is_empty() {
                self.queue.push(envelope);
                return;
            }
        }

        if let Err(envelope) = self.send_now(envelope) {
            self.queue.push(envelope);
        }
    }

    /// Drains the queue in order, stopping at the first failure.
    fn flush_pending(&mut self) {
        let total = self.queue.len();
        if total == 0 {
            return;
        }
        let mut sent = 0;
        while let Some(envelope) = self.queue.pop() {
            if let Err(envelope) = self.send_now(envelope) {
                self.queue.requeue_front(envelope);
                break;
            }
            sent += 1;
        }
        info!("session {}: flushed {sent}/{total} queued envelope(s)", self.id);
    }

    /// Hands one envelope to the transport, giving it back on failure.
    fn send_now(&mut self, envelope: Envelope) -> Result<(), Envelope> {
        let frame = match encode_envelope(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("session {}: dropping unencodable envelope: {e}", self.id);
                return Ok(());
            }
        };
        debug!("session {}: → {frame}", self.id);
        match self.transport.send(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("session {}: send failed ({e}); keeping envelope queued", self.id);
                Err(envelope)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::{MockTransport, ScriptedTransport, TransportError};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const ADDRESS: &str = "ws://192.168.4.1:81";

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Harness {
        state: SessionState,
        wire: ScriptedTransport,
        events: UnboundedReceiver<TransportEvent>,
        timers: UnboundedReceiver<RetryDue>,
    }

    impl Harness {
        fn new() -> Self {
            let (events_tx, events) = mpsc::unbounded_channel();
            let (timer_tx, timers) = mpsc::unbounded_channel();
            let wire = ScriptedTransport::new();
            let state = SessionState::new(
                Uuid::new_v4(),
                SessionConfig::default(),
                Box::new(wire.clone()),
                events_tx,
                timer_tx,
            );
            Self {
                state,
                wire,
                events,
                timers,
            }
        }

        fn connected() -> Self {
            let mut h = Self::new();
            h.state.connect(ADDRESS);
            h.wire.connect();
            h.pump(Instant::now());
            h
        }

        /// Feeds every queued transport event to the state.
        fn pump(&mut self, now: Instant) {
            while let Ok(event) = self.events.try_recv() {
                self.state.handle_transport_event(event, now);
            }
        }

        fn sent(&self) -> Vec<Update> {
            self.wire
                .envelopes()
                .into_iter()
                .flat_map(|env| env.data)
                .collect()
        }
    }

    #[test]
    fn test_configure_pin_then_first_write_always_sent() {
        // Arrange
        let mut h = Harness::connected();
        let t0 = Instant::now();

        // Act
        h.state.configure_pin(6, PinMode::AnalogOutput, None);
        let decision = h.state.analog_write(6, 100.0, WriteOptions::default(), t0);

        // Assert
        assert_eq!(decision, GateDecision::Send);
        assert_eq!(
            h.sent(),
            vec![Update::pin_mode(6, PinMode::AnalogOutput), Update::analog_write(6, 100)]
        );
    }

    #[test]
    fn test_analog_interval_and_threshold_scenario() {
        let mut h = Harness::connected();
        let t0 = Instant::now();
        let opts = WriteOptions::default();

        h.state.analog_write(6, 100.0, opts, t0);
        h.state.analog_write(6, 101.0, opts, t0 + ms(50));
        h.state.analog_write(6, 101.0, opts, t0 + ms(150));
        h.state.analog_write(6, 105.0, opts, t0 + ms(300));

        let values: Vec<i32> = h.sent().iter().filter_map(Update::value).collect();
        assert_eq!(values, vec![100, 105]);
    }

    #[test]
    fn test_digital_write_sends_only_on_change() {
        let mut h = Harness::connected();
        let t0 = Instant::now();
        let opts = WriteOptions::default();

        h.state.digital_write(13, 1, opts, t0);
        h.state.digital_write(13, 1, opts, t0 + ms(200));
        h.state.digital_write(13, 0, opts, t0 + ms(400));

        let values: Vec<i32> = h.sent().iter().filter_map(Update::value).collect();
        assert_eq!(values, vec![1, 0]);
    }

    #[test]
    fn test_configured_interval_survives_plain_writes() {
        let mut h = Harness::connected();
        let t0 = Instant::now();
        h.state.configure_pin(13, PinMode::Output, Some(ms(500)));

        h.state.digital_write(13, 1, WriteOptions::default(), t0);
        let decision = h.state.digital_write(13, 0, WriteOptions::default(), t0 + ms(200));

        assert_eq!(decision, GateDecision::SuppressedInterval);
    }

    #[test]
    fn test_writes_while_disconnected_flush_in_order_before_later_sends() {
        // Arrange: never connected yet.
        let mut h = Harness::new();
        let t0 = Instant::now();
        let opts = WriteOptions::default();
        h.state.digital_write(2, 1, opts, t0);
        h.state.digital_write(3, 1, opts, t0);
        h.state.digital_write(4, 1, opts, t0);
        assert_eq!(h.state.pending_len(), 3);
        assert!(h.wire.frames().is_empty());

        // Act: the link opens, then one more write.
        h.state.connect(ADDRESS);
        h.wire.connect();
        h.pump(t0);
        h.state.digital_write(5, 1, opts, t0);

        // Assert
        let ids: Vec<u16> = h.sent().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert_eq!(h.state.pending_len(), 0);
    }

    #[test]
    fn test_queued_envelopes_keep_one_frame_each() {
        let mut h = Harness::new();
        h.state.send(vec![Update::digital_write(2, 1), Update::digital_write(3, 0)]);
        h.state.send(vec![Update::stop(4)]);

        h.state.connect(ADDRESS);
        h.wire.connect();
        h.pump(Instant::now());

        assert_eq!(h.wire.frames().len(), 2);
        assert_eq!(h.wire.envelopes()[0].data.len(), 2);
    }

    #[test]
    fn test_send_failure_keeps_envelope_queued() {
        // Arrange: a transport that reports connected but refuses frames.
        let mut transport = MockTransport::new();
        transport.expect_open().times(1).return_const(());
        transport.expect_close().return_const(());
        transport.expect_is_open().return_const(true);
        transport
            .expect_send()
            .returning(|_| Err(TransportError::NotConnected));
        let (events_tx, _events) = mpsc::unbounded_channel();
        let (timer_tx, _timers) = mpsc::unbounded_channel();
        let mut state = SessionState::new(
            Uuid::new_v4(),
            SessionConfig::default(),
            Box::new(transport),
            events_tx,
            timer_tx,
        );
        state.connect(ADDRESS);
        let now = Instant::now();
        state.handle_transport_event(
            TransportEvent {
                generation: state.generation(),
                kind: TransportEventKind::Connected,
            },
            now,
        );

        // Act
        state.digital_write(13, 1, WriteOptions::default(), now);
        state.digital_write(12, 1, WriteOptions::default(), now);

        // Assert
        assert_eq!(state.pending_len(), 2);
    }

    #[test]
    fn test_inbound_report_for_unknown_pin_is_read_without_request() {
        let mut h = Harness::connected();
        let now = Instant::now();
        h.wire
            .deliver(r#"{"header":{"version":1},"data":[{"id":14,"action":5,"params":[512]}]}"#);
        h.pump(now);

        let value = h.state.analog_read(14, None, now);

        assert_eq!(value, 512);
        assert!(h.wire.frames().is_empty(), "no registration request expected");
    }

    #[test]
    fn test_first_read_registers_and_returns_zero() {
        let mut h = Harness::connected();
        let now = Instant::now();

        let first = h.state.digital_read(2, None, now);
        let second = h.state.digital_read(2, None, now + ms(10));

        assert_eq!(first, 0);
        assert_eq!(second, 0);
        assert_eq!(h.sent(), vec![Update::digital_read(2, ms(200))]);
    }

    #[test]
    fn test_read_interval_change_waits_for_old_interval() {
        let mut h = Harness::connected();
        let t0 = Instant::now();
        h.state.analog_read(14, None, t0);

        h.state.analog_read(14, Some(ms(50)), t0 + ms(100));
        h.state.analog_read(14, Some(ms(50)), t0 + ms(200));

        assert_eq!(
            h.sent(),
            vec![Update::analog_read(14, ms(200)), Update::analog_read(14, ms(50))]
        );
    }

    #[test]
    fn test_first_read_after_configure_registers_pin() {
        // Arrange
        let mut h = Harness::connected();
        let now = Instant::now();
        h.state.configure_pin(2, PinMode::InputPullup, None);

        // Act
        h.state.digital_read(2, None, now + ms(5));
        h.state.digital_read(2, None, now + ms(10));

        // Assert
        assert_eq!(
            h.sent(),
            vec![Update::pin_mode(2, PinMode::InputPullup), Update::digital_read(2, ms(200))]
        );
    }

    #[test]
    fn test_plain_reads_keep_configured_interval() {
        let mut h = Harness::connected();
        let t0 = Instant::now();
        h.state.configure_pin(14, PinMode::AnalogInput, Some(ms(500)));
        h.wire.clear_frames();

        for step in 0..10 {
            h.state.analog_read(14, None, t0 + ms(100 * step));
        }

        assert_eq!(h.sent(), vec![Update::analog_read(14, ms(500))]);
    }

    #[test]
    fn test_reconfigure_rearms_read_registration() {
        let mut h = Harness::connected();
        let now = Instant::now();
        h.state.configure_pin(14, PinMode::AnalogInput, None);
        h.state.analog_read(14, None, now);
        h.wire.clear_frames();

        h.state.configure_pin(14, PinMode::AnalogInput, None);
        h.state.analog_read(14, None, now + ms(1));

        assert_eq!(
            h.sent(),
            vec![Update::pin_mode(14, PinMode::AnalogInput), Update::analog_read(14, ms(200))]
        );
    }

    #[test]
    fn test_stop_sends_stop_and_deactivates() {
        let mut h = Harness::connected();
        let now = Instant::now();
        h.state.digital_read(2, None, now);

        h.state.stop(2);

        assert_eq!(h.sent().last(), Some(&Update::stop(2)));
        assert!(!h.state.registry().get(2).unwrap().active);
    }

    #[test]
    fn test_malformed_inbound_frame_is_dropped() {
        let mut h = Harness::connected();
        let now = Instant::now();

        assert!(h.state.handle_inbound(b"{\"header\":", now).is_none());
        let report = h
            .state
            .handle_inbound(br#"{"header":{"version":1},"data":[{"id":3,"action":3,"params":[1]}]}"#, now);

        assert_eq!(report.map(|r| r.created), Some(1));
    }

    #[test]
    fn test_other_protocol_version_is_still_applied() {
        let mut h = Harness::connected();
        let now = Instant::now();

        h.state
            .handle_inbound(br#"{"header":{"version":2},"data":[{"id":3,"action":3,"params":[1]}]}"#, now);

        assert_eq!(h.state.registry().current_value(3), Some(1));
    }

    #[test]
    fn test_events_from_replaced_connection_are_ignored() {
        let mut h = Harness::connected();
        let old_generation = h.wire.generation();

        h.state.reconnect().unwrap();
        h.state.handle_transport_event(
            TransportEvent {
                generation: old_generation,
                kind: TransportEventKind::Disconnected {
                    code: 1000,
                    reason: "forced".into(),
                },
            },
            Instant::now(),
        );

        let status = h.state.status();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert!(!status.reconnecting);
        assert!(h.timers.try_recv().is_err());
    }

    #[test]
    fn test_reconnect_without_address_is_an_error() {
        let mut h = Harness::new();
        assert!(matches!(h.state.reconnect(), Err(SessionError::NoAddress)));
    }

    #[test]
    fn test_disconnect_suppresses_automatic_reconnect() {
        let mut h = Harness::connected();

        h.state.disconnect();
        h.wire.drop_link(1000, "bye");
        h.pump(Instant::now());

        let status = h.state.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.attempts, status.max_attempts);
        assert!(h.state.reconnect.pending().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_gives_up_after_ten_retries_until_manual_reconnect() {
        // Arrange
        let mut h = Harness::new();
        h.state.connect(ADDRESS);
        h.wire.fail_connect("refused");
        h.pump(Instant::now());
        assert_eq!(h.state.status().attempts, 1);

        // Act: every retry fails.
        for _ in 0..10 {
            let due = h.timers.recv().await.unwrap();
            h.state.handle_retry_due(due);
            h.wire.fail_connect("refused");
            h.pump(Instant::now());
        }

        // Assert
        let status = h.state.status();
        assert_eq!(status.state, ConnectionState::GaveUp);
        assert_eq!(status.attempts, 10);
        assert_eq!(h.wire.open_calls().len(), 11);
        assert!(tokio::time::timeout(ms(120_000), h.timers.recv()).await.is_err());

        // A manual reconnect restores the budget and connects immediately.
        h.state.reconnect().unwrap();
        assert_eq!(h.wire.open_calls().len(), 12);
        h.wire.connect();
        h.pump(Instant::now());
        assert!(h.state.status().connected);
        assert_eq!(h.state.status().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_during_outage_flush_in_order_before_later_sends() {
        // Arrange: the link drops, then three pins are written.
        let mut h = Harness::connected();
        h.wire.drop_link(1006, "wifi lost");
        h.pump(Instant::now());
        let opts = WriteOptions::default();
        h.state.digital_write(2, 1, opts, Instant::now());
        h.state.digital_write(3, 1, opts, Instant::now());
        h.state.digital_write(4, 1, opts, Instant::now());
        assert_eq!(h.state.pending_len(), 3);

        // Act: the retry reconnects, then one more write.
        let due = h.timers.recv().await.unwrap();
        h.state.handle_retry_due(due);
        h.wire.connect();
        h.pump(Instant::now());
        h.state.digital_write(5, 1, opts, Instant::now());

        // Assert
        assert_eq!(h.state.pending_len(), 0);
        assert_eq!(
            h.sent(),
            vec![
                Update::digital_write(2, 1),
                Update::digital_write(3, 1),
                Update::digital_write(4, 1),
                Update::digital_write(5, 1),
            ]
        );
    }
}
