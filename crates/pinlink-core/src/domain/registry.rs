//! The event registry: the single source of truth for per-pin state.
//!
//! Both the outbound gate and the inbound demultiplexer work on the same
//! registry, and read calls answer from it synchronously.  The registry is a
//! plain owned value with no interior locking; the session that owns it is
//! responsible for serializing access.

use std::collections::hash_map::{Entry, HashMap};
use std::time::Duration;

use crate::domain::event::{Event, EventKind, PinId};

/// How an [`EventRegistry::upsert`] call changed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No event existed for the pin; a fresh one was created.
    Created,
    /// An event existed with a different kind and was reset.
    Retyped,
    /// An event of the same kind existed; only its policy was refreshed.
    Existing,
}

/// Mapping from pin id to [`Event`].  At most one event per pin.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: HashMap<PinId, Event>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, id: PinId) -> bool {
        self.events.contains_key(&id)
    }

    pub fn get(&self, id: PinId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn get_mut(&mut self, id: PinId) -> Option<&mut Event> {
        self.events.get_mut(&id)
    }

    /// Looks up or creates the event for `id` with the given kind.
    ///
    /// An existing event of the same kind keeps its send/receive state and
    /// takes the new `interval` and `threshold`.  An existing event of a
    /// different kind is reset, which also re-arms the first-send bypass.
    pub fn upsert(
        &mut self,
        id: PinId,
        kind: EventKind,
        interval: Duration,
        threshold: u32,
    ) -> (&mut Event, Registration) {
        match self.events.entry(id) {
            Entry::Occupied(entry) => {
                let event = entry.into_mut();
                if event.kind == kind {
                    event.interval = interval;
                    event.threshold = threshold;
                    (event, Registration::Existing)
                } else {
                    event.reset(kind, interval, threshold);
                    (event, Registration::Retyped)
                }
            }
            Entry::Vacant(entry) => (
                entry.insert(Event::new(id, kind, interval, threshold)),
                Registration::Created,
            ),
        }
    }

    /// Unconditionally (re)configures the event for `id`.
    ///
    /// Used by pin configuration: whatever state the pin had is discarded.
    pub fn configure(
        &mut self,
        id: PinId,
        kind: EventKind,
        interval: Duration,
        threshold: u32,
    ) -> &mut Event {
        let event = self
            .events
            .entry(id)
            .or_insert_with(|| Event::new(id, kind, interval, threshold));
        event.reset(kind, interval, threshold);
        event
    }

    /// Clears the `active` flag of the event for `id`.
    ///
    /// Returns `false` if the pin is not registered.
    pub fn mark_inactive(&mut self, id: PinId) -> bool {
        match self.events.get_mut(&id) {
            Some(event) => {
                event.active = false;
                true
            }
            None => false,
        }
    }

    /// Cached device value for `id`, if any was received.
    pub fn current_value(&self, id: PinId) -> Option<i32> {
        self.events.get(&id).and_then(|e| e.current_value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const MS_100: Duration = Duration::from_millis(100);
    const MS_200: Duration = Duration::from_millis(200);

    #[test]
    fn test_upsert_creates_missing_event() {
        let mut reg = EventRegistry::new();
        let (event, registration) = reg.upsert(13, EventKind::DigitalWrite, MS_100, 0);
        assert_eq!(registration, Registration::Created);
        assert_eq!(event.id, 13);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_upsert_same_kind_keeps_state_and_updates_policy() {
        let mut reg = EventRegistry::new();
        let now = Instant::now();
        reg.upsert(6, EventKind::AnalogWrite, MS_100, 2).0.mark_sent(100, now);

        let (event, registration) = reg.upsert(6, EventKind::AnalogWrite, MS_200, 5);

        assert_eq!(registration, Registration::Existing);
        assert_eq!(event.last_sent_value, Some(100));
        assert_eq!(event.interval, MS_200);
        assert_eq!(event.threshold, 5);
    }

    #[test]
    fn test_upsert_different_kind_resets_event() {
        let mut reg = EventRegistry::new();
        reg.upsert(14, EventKind::AnalogRead, MS_200, 0).0.current_value = Some(700);

        let (event, registration) = reg.upsert(14, EventKind::DigitalRead, MS_200, 0);

        assert_eq!(registration, Registration::Retyped);
        assert_eq!(event.kind, EventKind::DigitalRead);
        assert!(event.current_value.is_none());
        assert_eq!(reg.len(), 1, "a pin never has two events");
    }

    #[test]
    fn test_configure_discards_send_state_even_for_same_kind() {
        let mut reg = EventRegistry::new();
        let now = Instant::now();
        reg.upsert(6, EventKind::AnalogWrite, MS_100, 2).0.mark_sent(100, now);

        let event = reg.configure(6, EventKind::AnalogWrite, MS_100, 2);

        assert!(event.last_update.is_none());
        assert!(event.last_sent_value.is_none());
    }

    #[test]
    fn test_mark_inactive_unknown_pin_returns_false() {
        let mut reg = EventRegistry::new();
        assert!(!reg.mark_inactive(3));
    }

    #[test]
    fn test_mark_inactive_clears_flag() {
        let mut reg = EventRegistry::new();
        reg.upsert(3, EventKind::DigitalRead, MS_200, 0);
        assert!(reg.mark_inactive(3));
        assert!(!reg.get(3).unwrap().active);
    }

    #[test]
    fn test_current_value_is_none_for_unknown_pin() {
        let reg = EventRegistry::new();
        assert_eq!(reg.current_value(42), None);
    }
}
