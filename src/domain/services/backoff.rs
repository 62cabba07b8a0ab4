//! Reconnection backoff policy.

use std::time::Duration;

use rand::Rng;

use crate::config::ConnectionSettings;

/// Exponential, capped, jittered delay between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Multiplicative jitter factor in [0, 1].
    pub jitter: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self::new(settings.base_delay(), settings.max_delay(), settings.jitter)
    }

    /// Delay before a given attempt without jitter: `base * 2^(attempt-1)`, capped.
    pub fn nominal(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Delay before `attempt` given a uniform `sample` in [0, 1).
    ///
    /// The nominal delay is scaled by `1 + jitter * (2 * sample - 1)`.
    pub fn delay(&self, attempt: u32, sample: f64) -> Duration {
        let sample = sample.clamp(0.0, 1.0);
        let factor = 1.0 + self.jitter * (2.0 * sample - 1.0);
        self.nominal(attempt).mul_f64(factor.max(0.0))
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.delay(attempt, rng.random::<f64>())
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10), 0.5)
    }
}
