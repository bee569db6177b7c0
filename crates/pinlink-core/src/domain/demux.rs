//! Inbound demultiplexer: folds received updates into the event registry.
//!
//! The device reports pin state as ordinary updates
//! (`{ "id": 14, "action": 5, "params": [512] }`).  Each one is applied to the
//! registry in array order, so the last report for a pin within an envelope
//! wins.  There is no acknowledgement protocol.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::domain::event::EventKind;
use crate::domain::registry::EventRegistry;
use crate::protocol::messages::{Action, Envelope};

/// What to do when a report arrives for a pin registered with another kind
/// (for example an analog report for a pin the host configured as digital).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindMismatchPolicy {
    /// Store the value anyway and log a warning.
    #[default]
    Overwrite,
    /// Discard the report and log a warning.
    Drop,
}

/// Per-envelope counters, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemuxReport {
    /// Reports stored on an existing event.
    pub applied: usize,
    /// Reports that created a new event.
    pub created: usize,
    /// Reports whose kind disagreed with the registered event.
    pub mismatched: usize,
    /// Mismatched reports discarded under [`KindMismatchPolicy::Drop`].
    pub dropped: usize,
    /// `Stop` updates that deactivated an event.
    pub stopped: usize,
    /// Updates carrying no pin state, or no value.
    pub skipped: usize,
}

/// Applies inbound envelopes to an [`EventRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct InboundDemux {
    policy: KindMismatchPolicy,
    /// Interval given to events created from unsolicited reports.
    default_interval: Duration,
}

impl InboundDemux {
    pub fn new(policy: KindMismatchPolicy, default_interval: Duration) -> Self {
        Self {
            policy,
            default_interval,
        }
    }

    pub fn policy(&self) -> KindMismatchPolicy {
        self.policy
    }

    /// Applies every update of `envelope` to `registry`.
    pub fn apply(&self, registry: &mut EventRegistry, envelope: &Envelope, now: Instant) -> DemuxReport {
        let mut report = DemuxReport::default();

        for update in &envelope.data {
            if update.action == Action::Stop {
                if registry.mark_inactive(update.id) {
                    report.stopped += 1;
                } else {
                    report.skipped += 1;
                }
                continue;
            }

            let Some(kind) = EventKind::from_action(update.action) else {
                debug!("inbound update for id {} carries no pin state ({:?})", update.id, update.action);
                report.skipped += 1;
                continue;
            };

            let Some(value) = update.value() else {
                warn!("inbound {:?} for pin {} has no value; skipped", update.action, update.id);
                report.skipped += 1;
                continue;
            };

            if !registry.contains(update.id) {
                debug!("inbound report for unregistered pin {}; creating {:?} event", update.id, kind);
                let (event, _) = registry.upsert(update.id, kind, self.default_interval, 0);
                // The device is already reporting, so a later read must not
                // issue its own registration request.
                event.last_update = Some(now);
                event.current_value = Some(value);
                report.created += 1;
                continue;
            }

            let Some(event) = registry.get_mut(update.id) else {
                continue;
            };
            if event.kind != kind {
                report.mismatched += 1;
                match self.policy {
                    KindMismatchPolicy::Overwrite => {
                        warn!(
                            "pin {} registered as {:?} received {:?} report; value stored anyway",
                            update.id, event.kind, kind
                        );
                    }
                    KindMismatchPolicy::Drop => {
                        warn!(
                            "pin {} registered as {:?} received {:?} report; dropped",
                            update.id, event.kind, kind
                        );
                        report.dropped += 1;
                        continue;
                    }
                }
            }
            event.current_value = Some(value);
            report.applied += 1;
        }

        report
    }
}

impl Default for InboundDemux {
    fn default() -> Self {
        Self::new(KindMismatchPolicy::default(), Duration::from_millis(200))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
