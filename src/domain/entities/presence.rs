//! Presence set entity.

use std::collections::HashSet;

/// Set of identities currently known to be online.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    online: HashSet<i64>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with a snapshot.
    pub fn replace(&mut self, snapshot: impl IntoIterator<Item = i64>) {
        self.online = snapshot.into_iter().collect();
    }

    /// Mark an identity online. Returns false if it already was.
    pub fn add(&mut self, user_id: i64) -> bool {
        self.online.insert(user_id)
    }

    /// Mark an identity offline. Returns false if it already was.
    pub fn remove(&mut self, user_id: i64) -> bool {
        self.online.remove(&user_id)
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.online.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Online ids in ascending order, for stable rendering.
    pub fn sorted(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.online.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
