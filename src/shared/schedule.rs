//! Scheduled Transitions
//!
//! A small deadline queue used by the session components to drive their
//! timed state transitions (eviction notices, error auto-dismiss, pulses).
//! Components never spawn their own timers: they schedule keys here and the
//! session runtime sleeps until `next_deadline()` and hands due keys back.
//! Because time is always passed in explicitly, every transition is
//! deterministic under test.

use std::time::Instant;

/// Deadline queue keyed by transition.
///
/// Scheduling a key that is already pending replaces its deadline, so a key is
/// pending at most once.
#[derive(Debug, Clone)]
pub struct Schedule<K> {
    entries: Vec<(Instant, u64, K)>,
    sequence: u64,
}

impl<K: PartialEq> Schedule<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            sequence: 0,
        }
    }

    /// Schedule `key` to fire at `at`, replacing any pending deadline for it.
    pub fn schedule(&mut self, at: Instant, key: K) {
        self.entries.retain(|(_, _, k)| k != &key);
        self.sequence += 1;
        self.entries.push((at, self.sequence, key));
    }

    /// Cancel a pending key. Returns whether it was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, _, k)| k != key);
        before != self.entries.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.entries.iter().any(|(_, _, k)| k == key)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(at, _, _)| *at).min()
    }

    /// Remove and return every key due at `now`, in deadline order
    /// (ties broken by scheduling order).
    pub fn drain_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].0 <= now {
                due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|(at, seq, _)| (*at, *seq));
        due.into_iter().map(|(_, _, key)| key).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq> Default for Schedule<K> {
    fn default() -> Self {
        Self::new()
    }
}
