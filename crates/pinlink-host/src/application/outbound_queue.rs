//! Pending-outbound queue.
//!
//! Envelopes submitted while the link is down wait here and are drained in
//! submission order as soon as the link opens, before anything submitted
//! afterwards.  The queue is unbounded.

use std::collections::VecDeque;

use pinlink_core::Envelope;

#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Envelope>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Appends at the back.
    pub fn push(&mut self, envelope: Envelope) {
        self.pending.push_back(envelope);
    }

    /// Puts an envelope that failed to send back at the front.
    pub fn requeue_front(&mut self, envelope: Envelope) {
        self.pending.push_front(envelope);
    }

    pub fn pop(&mut self) -> Option<Envelope> {
        self.pending.pop_front()
    }
}
