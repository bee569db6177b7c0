//! Outbound gate: decides whether a pin write is worth transmitting.
//!
//! A sketch typically calls `analog_write` every frame, often with a value
//! derived from continuous input such as the mouse position.  Forwarding
//! every call would saturate the device's link, so each write passes two
//! checks against the pin's [`Event`]:
//!
//! 1. **Timing** – at least `interval` must have elapsed since the last
//!    accepted write.
//! 2. **Change** – digital writes must differ from the last sent level;
//!    analog writes must differ by more than `threshold`.
//!
//! The first write after a pin is (re)registered skips both checks, so the
//! initial state of a freshly configured pin always reaches the device.
//! Rejected writes are dropped, not queued: the next call re-evaluates with
//! its own value, so the latest call wins implicitly.

use std::time::{Duration, Instant};

use crate::domain::event::{Event, EventKind, PinId};
use crate::domain::registry::EventRegistry;

/// Outcome of passing a write through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Transmit now.
    Send,
    /// Dropped: the pin's interval has not elapsed.
    SuppressedInterval,
    /// Dropped: the value is not different enough from the last one sent.
    SuppressedUnchanged,
}

impl GateDecision {
    pub fn is_send(self) -> bool {
        matches!(self, GateDecision::Send)
    }
}

/// A write call after defaults have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub pin: PinId,
    /// [`EventKind::DigitalWrite`] or [`EventKind::AnalogWrite`].
    pub kind: EventKind,
    pub value: i32,
    pub interval: Duration,
    pub threshold: u32,
}

/// Stateless write-throttling policy.  All state lives in the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutboundGate;

impl OutboundGate {
    /// Evaluates `value` against `event` without changing anything.
    pub fn evaluate(event: &Event, value: i32, now: Instant) -> GateDecision {
        let last_update = match event.last_update {
            None => return GateDecision::Send,
            Some(t) => t,
        };

        if now.saturating_duration_since(last_update) < event.interval {
            return GateDecision::SuppressedInterval;
        }

        let last_sent = match event.last_sent_value {
            None => return GateDecision::Send,
            Some(v) => v,
        };

        let changed = match event.kind {
            EventKind::DigitalWrite => value != last_sent,
            EventKind::AnalogWrite => {
                (i64::from(value) - i64::from(last_sent)).unsigned_abs() > u64::from(event.threshold)
            }
            // Read registrations are only rate-limited.
            EventKind::DigitalRead | EventKind::AnalogRead => true,
        };

        if changed {
            GateDecision::Send
        } else {
            GateDecision::SuppressedUnchanged
        }
    }

    /// Looks up or creates the pin's event, evaluates the write, and records
    /// it as sent when approved.
    ///
    /// The caller must transmit the write if and only if this returns
    /// [`GateDecision::Send`].
    pub fn admit(
        &self,
        registry: &mut EventRegistry,
        request: &WriteRequest,
        now: Instant,
    ) -> GateDecision {
        let (event, _) = registry.upsert(request.pin, request.kind, request.interval, request.threshold);
        let decision = Self::evaluate(event, request.value, now);
        if decision.is_send() {
            event.mark_sent(request.value, now);
        }
        decision
    }
}

/// Rounds an analog write value to the integer the device will receive.
pub fn round_analog(value: f64) -> i32 {
    // `as` saturates out-of-range floats and maps NaN to 0.
    value.round() as i32
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn analog(pin: PinId, value: i32) -> WriteRequest {
        WriteRequest {
            pin,
            kind: EventKind::AnalogWrite,
            value,
            interval: ms(100),
            threshold: 2,
        }
    }

    fn digital(pin: PinId, value: i32) -> WriteRequest {
        WriteRequest {
            pin,
            kind: EventKind::DigitalWrite,
            value,
            interval: ms(100),
            threshold: 0,
        }
    }

    #[test]
    fn test_first_write_always_sends() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        assert_eq!(OutboundGate.admit(&mut reg, &analog(6, 100), t0), GateDecision::Send);
        assert_eq!(reg.get(6).unwrap().last_sent_value, Some(100));
    }

    #[test]
    fn test_write_inside_interval_is_suppressed() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &analog(6, 100), t0);

        let decision = OutboundGate.admit(&mut reg, &analog(6, 200), t0 + ms(50));

        assert_eq!(decision, GateDecision::SuppressedInterval);
        assert_eq!(reg.get(6).unwrap().last_sent_value, Some(100));
    }

    #[test]
    fn test_analog_write_within_threshold_is_suppressed() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &analog(6, 100), t0);

        let decision = OutboundGate.admit(&mut reg, &analog(6, 102), t0 + ms(150));

        assert_eq!(decision, GateDecision::SuppressedUnchanged);
    }

    #[test]
    fn test_analog_write_beyond_threshold_sends() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &analog(6, 100), t0);

        let decision = OutboundGate.admit(&mut reg, &analog(6, 97), t0 + ms(150));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_suppressed_write_does_not_move_the_window() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &analog(6, 100), t0);
        OutboundGate.admit(&mut reg, &analog(6, 150), t0 + ms(90));

        // 110 ms after the accepted write, not after the suppressed one.
        let decision = OutboundGate.admit(&mut reg, &analog(6, 150), t0 + ms(110));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_digital_write_same_level_is_suppressed() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &digital(13, 1), t0);

        let decision = OutboundGate.admit(&mut reg, &digital(13, 1), t0 + ms(500));

        assert_eq!(decision, GateDecision::SuppressedUnchanged);
    }

    #[test]
    fn test_digital_write_ignores_threshold() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        let mut request = digital(13, 0);
        request.threshold = 10;
        OutboundGate.admit(&mut reg, &request, t0);

        request.value = 1;
        let decision = OutboundGate.admit(&mut reg, &request, t0 + ms(100));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &digital(13, 0), t0);

        let decision = OutboundGate.admit(&mut reg, &digital(13, 1), t0 + ms(100));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_pins_are_throttled_independently() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &digital(2, 1), t0);

        let decision = OutboundGate.admit(&mut reg, &digital(3, 1), t0 + ms(1));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_switching_write_kind_rearms_first_send() {
        let mut reg = EventRegistry::new();
        let t0 = Instant::now();
        OutboundGate.admit(&mut reg, &digital(6, 1), t0);

        let decision = OutboundGate.admit(&mut reg, &analog(6, 1), t0 + ms(1));

        assert_eq!(decision, GateDecision::Send);
    }

    #[test]
    fn test_round_analog_rounds_to_nearest() {
        assert_eq!(round_analog(100.4), 100);
        assert_eq!(round_analog(100.5), 101);
        assert_eq!(round_analog(-0.4), 0);
        assert_eq!(round_analog(f64::NAN), 0);
        assert_eq!(round_analog(1e12), i32::MAX);
    }
}
