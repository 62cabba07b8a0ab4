//! Cache Module
//!
//! Client-side, memory-only caches scoped to the process:
//! - `BlobCache`: image bytes keyed by URL
//! - `ScrollMemory`: per-route scroll offsets
//!
//! The feed filter cache lives with the feed service since it carries its own
//! expiry and live-merge rules.

mod blob_cache;
mod scroll;

pub use blob_cache::BlobCache;
pub use scroll::ScrollMemory;
