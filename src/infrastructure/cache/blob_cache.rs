//! Image Blob Cache
//!
//! In-memory image bytes keyed by URL, kept for the life of the process.
//! Nothing is written to disk.

use std::future::Future;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;

use crate::shared::error::AppError;

/// Process-lifetime blob cache.
#[derive(Debug, Default)]
pub struct BlobCache {
    entries: DashMap<String, Bytes>,
}

impl BlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Bytes) {
        self.entries.insert(url.into(), bytes);
    }

    /// Return the cached blob, or load and remember it.
    ///
    /// Failed loads are not cached.
    pub async fn get_or_load<F, Fut>(&self, url: &str, load: F) -> Result<Bytes, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, AppError>>,
    {
        if let Some(bytes) = self.get(url) {
            trace!(url, "Blob cache hit");
            return Ok(bytes);
        }
        let bytes = load().await?;
        self.insert(url, bytes.clone());
        Ok(bytes)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
