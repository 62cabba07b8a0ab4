//! Per-route scroll offsets for the current tab session.

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct ScrollMemory {
    offsets: DashMap<String, f64>,
}

impl ScrollMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, route: impl Into<String>, offset: f64) {
        self.offsets.insert(route.into(), offset.max(0.0));
    }

    /// Saved offset for `route`, or the top of the page.
    pub fn restore(&self, route: &str) -> f64 {
        self.offsets.get(route).map(|o| *o).unwrap_or(0.0)
    }

    pub fn clear(&self) {
        self.offsets.clear();
    }
}
