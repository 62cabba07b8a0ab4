//! # Domain Services
//!
//! Pure decision logic that doesn't belong to a single entity.
//!
//! ## Services
//!
//! - **reconcile**: Merge a confirmed chat message into a list with optimistic records
//! - **BackoffPolicy**: Reconnection delay schedule
//! - **ModerationService**: Join checks and eviction signatures

mod backoff;
mod moderation;
mod reconcile;

pub use backoff::BackoffPolicy;
pub use moderation::{JoinDecision, ModerationService, Refusal};
pub use reconcile::{merge_confirmed, reconcile, MergeDecision};
