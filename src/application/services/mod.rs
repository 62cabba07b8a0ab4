//! Application Services
//!
//! Session components that turn channel events, HTTP results and user
//! commands into client state.
//!
//! ## Available Services
//!
//! - **ConnectionManager**: Live channel ownership, status and reconnection
//! - **PresenceTracker**: Online set from snapshots and deltas
//! - **RoomSession**: Room membership, optimistic send, moderation
//! - **NotificationHub**: Deduplicated inbox and arrival side effects
//! - **FeedSyncCache**: Filter-keyed feed cache with live merges
//! - **PostScope**: Live comments of the open post

pub mod connection_manager;
pub mod feed_sync;
pub mod notification_hub;
pub mod post_scope;
pub mod presence_tracker;
pub mod room_session;

pub use connection_manager::{ConnectionError, ConnectionManager, ConnectionMonitor, SessionChannel};
pub use feed_sync::{FeedNavigation, FeedSnapshot, FeedSyncCache, FeedView};
pub use notification_hub::{NotificationHub, DEFAULT_PUSH_ROUTE};
pub use post_scope::PostScope;
pub use presence_tracker::{PresenceTracker, SnapshotToken};
pub use room_session::{ComposerBlock, ComposerState, RoomAction, RoomError, RoomNotice, RoomSession};
