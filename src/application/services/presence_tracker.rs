//! Presence Tracker
//!
//! Online set seeded by a snapshot fetch on every (re)connect and maintained
//! by presence deltas in between. Deltas that arrive while a snapshot is in
//! flight are replayed on top of it once it lands; a snapshot requested for
//! an earlier connection is discarded.

use tracing::debug;

use crate::domain::entities::PresenceSet;

/// Identifies one snapshot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Online(i64),
    Offline(i64),
}

/// Derived set of online identities.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: PresenceSet,
    generation: u64,
    pending: Option<u64>,
    buffered: Vec<Delta>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a snapshot for a fresh connection. Earlier requests become stale.
    pub fn begin_snapshot(&mut self) -> SnapshotToken {
        self.generation += 1;
        self.pending = Some(self.generation);
        self.buffered.clear();
        SnapshotToken(self.generation)
    }

    /// Replace the set with a fetched snapshot. Returns false if the token is
    /// stale.
    pub fn apply_snapshot(&mut self, token: SnapshotToken, ids: Vec<i64>) -> bool {
        if self.pending != Some(token.0) {
            debug!(token = token.0, "Discarding stale presence snapshot");
            return false;
        }
        self.pending = None;
        self.online.replace(ids);
        for delta in std::mem::take(&mut self.buffered) {
            self.apply(delta);
        }
        true
    }

    /// A failed snapshot leaves the deltas seen so far in effect.
    pub fn abandon_snapshot(&mut self, token: SnapshotToken) {
        if self.pending == Some(token.0) {
            self.pending = None;
            for delta in std::mem::take(&mut self.buffered) {
                self.apply(delta);
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn on_online(&mut self, user_id: i64) {
        self.record(Delta::Online(user_id));
    }

    pub fn on_offline(&mut self, user_id: i64) {
        self.record(Delta::Offline(user_id));
    }

    /// Forget everything: presence means nothing without a live channel.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.buffered.clear();
        self.online.clear();
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.online.contains(user_id)
    }

    pub fn online(&self) -> Vec<i64> {
        self.online.sorted()
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    fn record(&mut self, delta: Delta) {
        if self.pending.is_some() {
            self.buffered.push(delta);
        }
        self.apply(delta);
    }

    fn apply(&mut self, delta: Delta) {
        match delta {
            Delta::Online(id) => {
                self.online.add(id);
            }
            Delta::Offline(id) => {
                self.online.remove(id);
            }
        }
    }
}
