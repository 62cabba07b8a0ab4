//! Live channel message formats.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}` with
//! kebab-case event names and camelCase payload fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    AccessPolicy, BroadcastRecord, Comment, ConfirmedMessage, Lifecycle, Notification,
    PostSummary,
};

/// Coarse event families listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection lifecycle, synthesized by the connection manager
    Lifecycle,
    Presence,
    Room,
    Notification,
    Feed,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Lifecycle,
        EventKind::Presence,
        EventKind::Room,
        EventKind::Notification,
        EventKind::Feed,
    ];
}

/// Event received from the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum InboundEvent {
    // Lifecycle
    Connect,
    Disconnect { reason: String },
    ConnectError { reason: String },
    ReconnectAttempt { attempt: u32 },
    Reconnect,
    ReconnectFailed,

    // Presence
    PresenceOnline { id: i64 },
    PresenceOffline { id: i64 },

    // Rooms
    RoomMessage { room_id: i64, message: ConfirmedMessage },
    RoomError { room_id: i64, error: String },
    MemberKicked {
        room_id: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    RoomAccessChanged { room_id: i64, access_type: AccessPolicy },
    RosterUpdated { room_id: i64 },

    // Notifications
    Notification(Notification),
    NotificationsMarkedRead,
    Broadcast(BroadcastRecord),

    // Feed
    PostCreated(PostSummary),
    PostLiked { post_id: i64, like_count: u32 },
    PostUpdated { post_id: i64, post: PostSummary },
    PostDeleted { post_id: i64 },
    CommentCountUpdated { post_id: i64, count: u32 },
    CommentCreated(Comment),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect
            | Self::Disconnect { .. }
            | Self::ConnectError { .. }
            | Self::ReconnectAttempt { .. }
            | Self::Reconnect
            | Self::ReconnectFailed => EventKind::Lifecycle,
            Self::PresenceOnline { .. } | Self::PresenceOffline { .. } => EventKind::Presence,
            Self::RoomMessage { .. }
            | Self::RoomError { .. }
            | Self::MemberKicked { .. }
            | Self::RoomAccessChanged { .. }
            | Self::RosterUpdated { .. } => EventKind::Room,
            Self::Notification(_) | Self::NotificationsMarkedRead | Self::Broadcast(_) => {
                EventKind::Notification
            }
            Self::PostCreated(_)
            | Self::PostLiked { .. }
            | Self::PostUpdated { .. }
            | Self::PostDeleted { .. }
            | Self::CommentCountUpdated { .. }
            | Self::CommentCreated(_) => EventKind::Feed,
        }
    }

    /// Wire name of the event, used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::ConnectError { .. } => "connect-error",
            Self::ReconnectAttempt { .. } => "reconnect-attempt",
            Self::Reconnect => "reconnect",
            Self::ReconnectFailed => "reconnect-failed",
            Self::PresenceOnline { .. } => "presence-online",
            Self::PresenceOffline { .. } => "presence-offline",
            Self::RoomMessage { .. } => "room-message",
            Self::RoomError { .. } => "room-error",
            Self::MemberKicked { .. } => "member-kicked",
            Self::RoomAccessChanged { .. } => "room-access-changed",
            Self::RosterUpdated { .. } => "roster-updated",
            Self::Notification(_) => "notification",
            Self::NotificationsMarkedRead => "notifications-marked-read",
            Self::Broadcast(_) => "broadcast",
            Self::PostCreated(_) => "post-created",
            Self::PostLiked { .. } => "post-liked",
            Self::PostUpdated { .. } => "post-updated",
            Self::PostDeleted { .. } => "post-deleted",
            Self::CommentCountUpdated { .. } => "comment-count-updated",
            Self::CommentCreated(_) => "comment-created",
        }
    }

    /// The connection state machine input this event carries, if any.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        match self {
            Self::Connect => Some(Lifecycle::Connected),
            Self::Reconnect => Some(Lifecycle::Resumed),
            Self::Disconnect { reason } => Some(Lifecycle::Dropped {
                reason: reason.clone(),
            }),
            Self::ConnectError { reason } => Some(Lifecycle::ConnectFailed {
                reason: reason.clone(),
            }),
            Self::ReconnectAttempt { attempt } => Some(Lifecycle::Attempt(*attempt)),
            Self::ReconnectFailed => Some(Lifecycle::GaveUp),
            _ => None,
        }
    }

    /// Whether the peer may send this event. Lifecycle events are local only.
    pub fn is_wire(&self) -> bool {
        self.kind() != EventKind::Lifecycle
    }
}

/// Command sent on the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum OutboundCommand {
    JoinRoom { room_id: i64 },
    LeaveRoom { room_id: i64 },
    SendRoomMessage {
        room_id: i64,
        content: String,
        /// Tentative id of the optimistic record
        client_id: Uuid,
    },
    JoinPostScope { post_id: i64 },
    LeavePostScope { post_id: i64 },
}
