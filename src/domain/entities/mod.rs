//! # Domain Entities
//!
//! Client-side entities of the real-time session layer.
//!
//! ## Session
//!
//! - **Identity**: The authenticated user and its privilege level
//! - **ConnectionState**: Status state machine of the live channel
//! - **PresenceSet**: Identities currently online
//!
//! ## Content
//!
//! - **Room**: Chat room with messages, roster and mute state
//! - **Message**: Tentative or confirmed chat message
//! - **Notification**: Inbox record, broadcast and push payloads
//! - **PostSummary**: Feed entry and its filter key

mod connection;
mod identity;
mod message;
mod notification;
mod post;
mod presence;
mod room;

pub use connection::{ConnectionState, ConnectionStatus, Lifecycle};
pub use identity::{Credential, Identity, Privilege};
pub use message::{ConfirmedMessage, Message, MessageKey};
pub use notification::{BroadcastRecord, Notification, NotificationType, PushPayload};
pub use post::{Comment, FeedKey, PostPage, PostSummary};
pub use presence::PresenceSet;
pub use room::{AccessPolicy, Room, RoomState, RoomSummary, RosterMember};
