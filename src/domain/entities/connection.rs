//! Connection status state machine.
//!
//! Pure transition logic for the live channel. The connection manager's driver
//! feeds lifecycle events in; the UI reads the status, the attempt counter and
//! the debounced problem indicator out.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Discrete status of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    /// Statuses the UI reports as a connection problem (after debounce).
    pub fn is_problem(&self) -> bool {
        matches!(self, Self::Reconnecting | Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Handshake acknowledged.
    Connected,
    /// Transport dropped (peer-initiated or network fault).
    Dropped { reason: String },
    /// A connection attempt failed.
    ConnectFailed { reason: String },
    /// Reconnection attempt `n` is starting.
    Attempt(u32),
    /// Connection resumed after a drop.
    Resumed,
    /// Retry budget exhausted or peer permanently refused.
    GaveUp,
}

/// Status, attempt counter and problem timestamp of one session's channel.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    status: ConnectionStatus,
    attempt: u32,
    problem_since: Option<Instant>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// idle -> connecting, once an identity is available.
    pub fn begin(&mut self) {
        self.status = ConnectionStatus::Connecting;
        self.attempt = 0;
        self.problem_since = None;
    }

    /// Any state -> idle (identity cleared).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a lifecycle input. Returns whether the status changed.
    ///
    /// Inputs arriving while idle belong to a torn-down channel and are ignored.
    pub fn apply(&mut self, input: &Lifecycle, now: Instant) -> bool {
        if self.status == ConnectionStatus::Idle {
            return false;
        }
        let before = self.status;
        match input {
            Lifecycle::Connected | Lifecycle::Resumed => {
                self.status = ConnectionStatus::Connected;
                self.attempt = 0;
                self.problem_since = None;
            }
            Lifecycle::Dropped { .. } | Lifecycle::ConnectFailed { .. } => {
                if self.status != ConnectionStatus::Disconnected {
                    self.status = ConnectionStatus::Reconnecting;
                }
                self.problem_since.get_or_insert(now);
            }
            Lifecycle::Attempt(n) => {
                self.status = ConnectionStatus::Reconnecting;
                self.attempt = *n;
                self.problem_since.get_or_insert(now);
            }
            Lifecycle::GaveUp => {
                self.status = ConnectionStatus::Disconnected;
                self.problem_since.get_or_insert(now);
            }
        }
        before != self.status
    }

    /// Whether the "reconnecting / disconnected" indicator should be visible.
    ///
    /// Brief blips shorter than `debounce` never raise it.
    pub fn indicator_visible(&self, now: Instant, debounce: Duration) -> bool {
        match self.problem_since {
            Some(since) if self.status.is_problem() => now.duration_since(since) >= debounce,
            _ => false,
        }
    }

    /// When the indicator will flip to visible if nothing else happens.
    pub fn indicator_deadline(&self, now: Instant, debounce: Duration) -> Option<Instant> {
        match self.problem_since {
            Some(since) if self.status.is_problem() => {
                let at = since + debounce;
                (at > now).then_some(at)
            }
            _ => None,
        }
    }
}
