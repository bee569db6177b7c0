//! The per-pin event record.

use std::time::{Duration, Instant};

use crate::protocol::messages::{Action, PinMode};

/// Pin number or extension device id.
pub type PinId = u16;

/// What the host does with a pin.  Fixed at registration; decides both the
/// throttling rule on the write path and the parse target on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DigitalWrite,
    AnalogWrite,
    DigitalRead,
    AnalogRead,
}

impl EventKind {
    /// Kind implied by a pin mode.
    pub fn from_mode(mode: PinMode) -> Self {
        match mode {
            PinMode::Input | PinMode::InputPullup | PinMode::InputPulldown => EventKind::DigitalRead,
            PinMode::Output | PinMode::OutputOpenDrain => EventKind::DigitalWrite,
            PinMode::AnalogInput => EventKind::AnalogRead,
            PinMode::AnalogOutput => EventKind::AnalogWrite,
        }
    }

    /// Kind implied by an update's action, if the action carries pin state.
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::DigitalWrite => Some(EventKind::DigitalWrite),
            Action::AnalogWrite => Some(EventKind::AnalogWrite),
            Action::DigitalRead => Some(EventKind::DigitalRead),
            Action::AnalogRead => Some(EventKind::AnalogRead),
            Action::PinMode | Action::Stop | Action::Extension(_) => None,
        }
    }

    /// The action used on the wire for this kind.
    pub fn action(self) -> Action {
        match self {
            EventKind::DigitalWrite => Action::DigitalWrite,
            EventKind::AnalogWrite => Action::AnalogWrite,
            EventKind::DigitalRead => Action::DigitalRead,
            EventKind::AnalogRead => Action::AnalogRead,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, EventKind::DigitalWrite | EventKind::AnalogWrite)
    }
}

/// Host-side cached state and throttling policy for one pin.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: PinId,
    pub kind: EventKind,
    /// Minimum time between two transmissions (write kinds) or two
    /// registration requests (read kinds).
    pub interval: Duration,
    /// Minimum absolute delta before an analog write is re-sent.
    pub threshold: u32,
    /// Time of the last transmission or registration; `None` = never sent.
    pub last_update: Option<Instant>,
    /// Last value actually transmitted (write kinds).
    pub last_sent_value: Option<i32>,
    /// Last value reported by the device (read kinds).
    pub current_value: Option<i32>,
    /// Cleared when a `Stop` is sent or received for this pin.
    pub active: bool,
}

impl Event {
    pub fn new(id: PinId, kind: EventKind, interval: Duration, threshold: u32) -> Self {
        Self {
            id,
            kind,
            interval,
            threshold,
            last_update: None,
            last_sent_value: None,
            current_value: None,
            active: true,
        }
    }

    /// Replaces the kind and policy, keeping only the id.
    pub fn reset(&mut self, kind: EventKind, interval: Duration, threshold: u32) {
        *self = Event::new(self.id, kind, interval, threshold);
    }

    /// Cached device value, `0` until the first report arrives.
    pub fn value_or_default(&self) -> i32 {
        self.current_value.unwrap_or(0)
    }

    /// Records an accepted transmission.
    pub fn mark_sent(&mut self, value: i32, now: Instant) {
        self.last_update = Some(now);
        self.last_sent_value = Some(value);
        self.active = true;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
