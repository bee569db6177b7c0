//! Reconnection controller: the backoff state machine plus its timer.
//!
//! [`ReconnectStateMachine`] decides *whether* and *when* to retry; this
//! controller owns the one pending timer task that turns that decision into a
//! [`RetryDue`] message on the session's driver channel.
//!
//! At most one retry is pending at a time.  Every manual action cancels it,
//! and a timer that fires after being superseded is recognised by its token
//! and ignored.

use std::time::Duration;

use pinlink_core::{ReconnectDecision, ReconnectPolicy, ReconnectStateMachine};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Sent to the driver when a retry timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDue {
    pub token: u64,
}

/// A pending retry timer.
#[derive(Debug)]
pub struct ScheduledRetry {
    token: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

impl ScheduledRetry {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn cancel(self) {
        self.handle.abort();
    }
}

pub struct ReconnectController {
    machine: ReconnectStateMachine,
    pending: Option<ScheduledRetry>,
    next_token: u64,
    timer_tx: UnboundedSender<RetryDue>,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy, timer_tx: UnboundedSender<RetryDue>) -> Self {
        Self {
            machine: ReconnectStateMachine::new(policy),
            pending: None,
            next_token: 0,
            timer_tx,
        }
    }

    pub fn machine(&self) -> &ReconnectStateMachine {
        &self.machine
    }

    pub fn pending(&self) -> Option<&ScheduledRetry> {
        self.pending.as_ref()
    }

    /// Cancels the pending retry, if any.  Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(retry) = self.pending.take() {
            debug!("cancelling pending retry {}", retry.token);
            retry.cancel();
        }
    }

    pub fn begin_connect(&mut self) {
        self.cancel();
        self.machine.begin_connect();
    }

    pub fn manual_reconnect(&mut self) {
        self.cancel();
        self.machine.manual_reconnect();
    }

    pub fn manual_disconnect(&mut self) {
        self.cancel();
        self.machine.manual_disconnect();
    }

    pub fn on_connected(&mut self) {
        self.cancel();
        self.machine.on_connected();
    }

    /// Handles a lost link or a failed attempt, scheduling a retry when the
    /// state machine asks for one.  Must run inside a Tokio runtime.
    pub fn on_link_lost(&mut self, attempt_failed: bool) -> ReconnectDecision {
        let decision = if attempt_failed {
            self.machine.on_connect_failed()
        } else {
            self.machine.on_disconnected()
        };
        if let ReconnectDecision::Retry { delay, .. } = decision {
            self.schedule(delay);
        }
        decision
    }

    /// Consumes a fired timer.  Returns `true` if the session should open a
    /// new connection now.
    pub fn on_retry_due(&mut self, due: RetryDue) -> bool {
        match &self.pending {
            Some(retry) if retry.token == due.token => {
                self.pending = None;
                self.machine.on_retry_due()
            }
            _ => {
                debug!("ignoring superseded retry {}", due.token);
                false
            }
        }
    }

    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        self.next_token += 1;
        let token = self.next_token;
        let tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RetryDue { token });
        });
        self.pending = Some(ScheduledRetry { token, delay, handle });
    }
}

impl Drop for ReconnectController {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
