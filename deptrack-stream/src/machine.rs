//! Connection lifecycle state machine.
//!
//! Pure and synchronous: every trigger returns the [`Action`]s the driver must
//! perform (open/close the channel, arm/cancel the reconnect timer). The
//! driver in `client` owns the actual channel and timer.
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!                     ^            |
//!                     |          Error -> Disconnected (budget exhausted)
//!                     |            |
//!                     +------ Reconnecting (timer armed)
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Issue a channel-open request with the current credential.
    Open,
    /// Drop the live or in-flight channel.
    Close,
    ScheduleReconnect(Duration),
    CancelReconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    policy: BackoffPolicy,
    state: ConnectionState,
    reconnect_attempt: u32,
    credential: Option<String>,
    timer_pending: bool,
    connection_error: Option<String>,
}

impl ConnectionMachine {
    pub fn new(policy: BackoffPolicy, credential: Option<String>) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            reconnect_attempt: 0,
            credential,
            timer_pending: false,
            connection_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.timer_pending
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            info!(from = %self.state, to = %to, attempt = self.reconnect_attempt, "stream state");
            self.state = to;
        }
    }

    /// Cancel a pending timer and close any live or in-flight channel.
    fn teardown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.timer_pending {
            self.timer_pending = false;
            actions.push(Action::CancelReconnect);
        }
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            actions.push(Action::Close);
        }
        actions
    }

    /// Open the channel, replacing any existing one. No-op without a credential.
    pub fn connect(&mut self) -> Vec<Action> {
        if self.credential.is_none() {
            debug!("connect requested without a credential; ignoring");
            return Vec::new();
        }
        let mut actions = self.teardown();
        self.transition(ConnectionState::Connecting);
        actions.push(Action::Open);
        actions
    }

    /// Valid from any state; always ends Disconnected with no timer armed.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let actions = self.teardown();
        self.reconnect_attempt = 0;
        self.transition(ConnectionState::Disconnected);
        actions
    }

    /// Manual retry: reset the budget and connect immediately.
    pub fn reconnect(&mut self) -> Vec<Action> {
        self.reconnect_attempt = 0;
        self.connection_error = None;
        self.connect()
    }

    /// Replace the credential; clearing it disconnects.
    pub fn set_credential(&mut self, credential: Option<String>) -> Vec<Action> {
        self.credential = credential;
        if self.credential.is_none() && self.state != ConnectionState::Disconnected {
            return self.disconnect();
        }
        Vec::new()
    }

    pub fn on_open(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "ignoring stale open");
            return Vec::new();
        }
        self.reconnect_attempt = 0;
        self.connection_error = None;
        self.transition(ConnectionState::Connected);
        Vec::new()
    }

    /// The open failed or the live channel dropped.
    pub fn on_failure(&mut self, reason: &str) -> Vec<Action> {
        if !matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(state = %self.state, reason, "ignoring failure outside an active channel");
            return Vec::new();
        }
        self.transition(ConnectionState::Error);

        let mut actions = vec![Action::Close];
        if self.reconnect_attempt < self.policy.max_attempts {
            let delay = self.policy.delay_for(self.reconnect_attempt);
            self.reconnect_attempt += 1;
            self.timer_pending = true;
            warn!(
                reason,
                attempt = self.reconnect_attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "stream lost; scheduling reconnect"
            );
            self.transition(ConnectionState::Reconnecting);
            actions.push(Action::ScheduleReconnect(delay));
        } else {
            let message = format!(
                "Failed to connect after {} attempts: {reason}",
                self.policy.max_attempts
            );
            warn!(%message, "giving up on notification stream");
            self.connection_error = Some(message);
            self.transition(ConnectionState::Disconnected);
        }
        actions
    }

    pub fn on_timer(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Reconnecting || !self.timer_pending {
            return Vec::new();
        }
        self.timer_pending = false;
        if self.credential.is_none() {
            self.transition(ConnectionState::Disconnected);
            return Vec::new();
        }
        self.transition(ConnectionState::Connecting);
        vec![Action::Open]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(BackoffPolicy::default(), Some("token".to_string()))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = BackoffPolicy::default();
        let delays: Vec<Duration> = (0..7).map(|a| p.delay_for(a)).collect();
        assert_eq!(
            delays,
            vec![ms(1000), ms(2000), ms(4000), ms(8000), ms(16000), ms(30000), ms(30000)]
        );
        assert_eq!(p.delay_for(64), ms(30000));
    }

    #[test]
    fn connect_without_credential_is_noop() {
        let mut m = ConnectionMachine::new(BackoffPolicy::default(), None);
        assert!(m.connect().is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn successful_open_resets_attempts() {
        let mut m = machine();
        assert_eq!(m.connect(), vec![Action::Open]);
        m.on_failure("refused");
        assert_eq!(m.reconnect_attempt(), 1);
        assert_eq!(m.on_timer(), vec![Action::Open]);
        m.on_open();
        assert!(m.is_connected());
        assert_eq!(m.reconnect_attempt(), 0);
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn budget_exhaustion_stops_retrying() {
        let mut m = machine();
        m.connect();
        let mut delays = Vec::new();
        for _ in 0..5 {
            let actions = m.on_failure("refused");
            match actions.as_slice() {
                [Action::Close, Action::ScheduleReconnect(d)] => delays.push(*d),
                other => panic!("unexpected actions {other:?}"),
            }
            assert_eq!(m.state(), ConnectionState::Reconnecting);
            assert_eq!(m.on_timer(), vec![Action::Open]);
        }
        assert_eq!(delays, vec![ms(1000), ms(2000), ms(4000), ms(8000), ms(16000)]);

        assert_eq!(m.on_failure("refused"), vec![Action::Close]);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.is_connected());
        assert!(!m.reconnect_pending());
        assert!(m.connection_error().unwrap().contains("after 5 attempts"));
        assert!(m.on_timer().is_empty());
    }

    #[test]
    fn reconnect_after_exhaustion_resets_budget() {
        let mut m = machine();
        m.connect();
        for _ in 0..5 {
            m.on_failure("refused");
            m.on_timer();
        }
        m.on_failure("refused");
        assert_eq!(m.reconnect_attempt(), 5);

        assert_eq!(m.reconnect(), vec![Action::Open]);
        assert_eq!(m.reconnect_attempt(), 0);
        assert_eq!(m.connection_error(), None);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn disconnect_cancels_pending_timer() {
        let mut m = machine();
        m.connect();
        m.on_failure("reset");
        assert!(m.reconnect_pending());

        assert_eq!(m.disconnect(), vec![Action::CancelReconnect]);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.reconnect_pending());
        // A late timer tick must not resurrect the connection.
        assert!(m.on_timer().is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_is_safe_from_every_state() {
        let mut m = machine();
        assert!(m.disconnect().is_empty());
        m.connect();
        assert_eq!(m.disconnect(), vec![Action::Close]);
        m.connect();
        m.on_open();
        assert_eq!(m.disconnect(), vec![Action::Close]);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_while_active_tears_down_first() {
        let mut m = machine();
        m.connect();
        m.on_open();
        assert_eq!(m.connect(), vec![Action::Close, Action::Open]);
        assert_eq!(m.state(), ConnectionState::Connecting);

        m.on_failure("reset");
        assert_eq!(m.connect(), vec![Action::CancelReconnect, Action::Open]);
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn clearing_credential_disconnects() {
        let mut m = machine();
        m.connect();
        m.on_open();
        assert_eq!(m.set_credential(None), vec![Action::Close]);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.connect().is_empty());
    }

    #[test]
    fn stale_events_are_ignored() {
        let mut m = machine();
        assert!(m.on_open().is_empty());
        assert!(m.on_failure("late").is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn dropped_live_channel_is_retried() {
        let mut m = machine();
        m.connect();
        m.on_open();
        assert_eq!(
            m.on_failure("eof"),
            vec![Action::Close, Action::ScheduleReconnect(ms(1000))]
        );
        assert_eq!(m.connection_error(), None);
    }
}
