//! # Domain Layer
//!
//! Entities and pure rules of the session layer. Nothing in here performs I/O;
//! timing rules take `Instant`s and random samples from the caller.
//!
//! ## Structure
//!
//! - **entities**: Identity, connection state, rooms, messages, notifications, posts
//! - **services**: Pure decision functions (message reconciliation, backoff, moderation)

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
