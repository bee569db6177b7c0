//! Reconnection policy and the connection state machine.
//!
//! When the link to the device drops (or a connection attempt fails), the
//! session retries with exponential backoff:
//!
//! ```text
//! delay(n) = min(base_delay × growth_factor^(n-1), max_delay)
//! ```
//!
//! With the defaults that is 1000, 1500, 2250, 3375 ms … capped at 30 s.
//! After `max_attempts` scheduled retries the machine gives up and stays in
//! [`ConnectionState::GaveUp`] until the user calls connect or reconnect.
//!
//! This module only *decides*.  Owning the timer and opening the socket is
//! the host's job.

use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Number of retries before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per further retry.
    pub growth_factor: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    /// | Field          | Default   |
    /// |----------------|-----------|
    /// | max_attempts   | 10        |
    /// | base_delay     | 1000 ms   |
    /// | growth_factor  | 1.5       |
    /// | max_delay      | 30000 ms  |
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            growth_factor: 1.5,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), rounded to whole
    /// milliseconds.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use pinlink_core::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy::default();
    /// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2250));
    /// assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(30));
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.growth_factor.powi(exponent)).min(max_ms);
        Duration::from_millis(delay_ms.round() as u64)
    }
}

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    Connected,
    /// Closed by the user; no automatic retries.
    Disconnected,
    /// Waiting for the retry timer.
    Backoff,
    /// Retries exhausted; terminal until a manual connect or reconnect.
    GaveUp,
}

/// What the host should do after the link was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retries exhausted.
    GiveUp { attempts: u32 },
    /// A retry is already pending; nothing to do.
    AlreadyScheduled,
    /// Automatic reconnection is off (manual disconnect, or never connected).
    Suppressed,
}

/// Connection lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub struct ReconnectStateMachine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    current_delay: Duration,
}

impl ReconnectStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            attempts: 0,
            current_delay: policy.base_delay,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries scheduled since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay of the most recently scheduled retry.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` while an automatic retry is pending or in flight.
    pub fn is_reconnecting(&self) -> bool {
        match self.state {
            ConnectionState::Backoff => true,
            ConnectionState::Connecting => self.attempts > 0,
            _ => false,
        }
    }

    /// A user-initiated connect: clears the retry budget and starts an
    /// attempt.
    pub fn begin_connect(&mut self) {
        self.attempts = 0;
        self.current_delay = self.policy.base_delay;
        self.state = ConnectionState::Connecting;
    }

    /// A user-initiated reconnect.  The caller cancels any pending retry and
    /// force-closes the old link before opening a new one.
    pub fn manual_reconnect(&mut self) {
        self.begin_connect();
    }

    /// A user-initiated disconnect.  Exhausts the retry budget so nothing
    /// reconnects behind the user's back.
    pub fn manual_disconnect(&mut self) {
        self.attempts = self.policy.max_attempts;
        self.state = ConnectionState::Disconnected;
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.current_delay = self.policy.base_delay;
        self.state = ConnectionState::Connected;
    }

    /// An open link closed.
    pub fn on_disconnected(&mut self) -> ReconnectDecision {
        self.schedule_retry()
    }

    /// A connection attempt failed before the link opened.
    pub fn on_connect_failed(&mut self) -> ReconnectDecision {
        self.schedule_retry()
    }

    /// The retry timer fired.  Returns `true` if the host should now open a
    /// new connection; `false` if the retry was overtaken by a manual action.
    pub fn on_retry_due(&mut self) -> bool {
        if self.state == ConnectionState::Backoff {
            self.state = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    fn schedule_retry(&mut self) -> ReconnectDecision {
        match self.state {
            ConnectionState::Backoff => return ReconnectDecision::AlreadyScheduled,
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::GaveUp => {
                return ReconnectDecision::Suppressed
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
        }

        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::GaveUp;
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        self.current_delay = self.policy.delay_for_attempt(self.attempts);
        self.state = ConnectionState::Backoff;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.current_delay,
        }
    }
}

impl Default for ReconnectStateMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
