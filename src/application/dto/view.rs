//! Session view DTOs.
//!
//! Snapshot of everything the presentation layer renders, rebuilt by the
//! session runtime after each processed input.

use crate::application::services::{ComposerState, RoomNotice};
use crate::domain::entities::{
    AccessPolicy, Comment, ConnectionStatus, FeedKey, Message, Notification, PostSummary,
    RosterMember,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionView {
    pub user_id: Option<i64>,
    pub connection: ConnectionView,
    pub online: Vec<i64>,
    pub presence_loading: bool,
    pub rooms: Vec<RoomListItem>,
    pub active_room: Option<ActiveRoomView>,
    pub room_notice: Option<RoomNotice>,
    pub notifications: Vec<Notification>,
    pub unread: usize,
    /// Visual pulse on the notification bell
    pub pulse: bool,
    pub feed: FeedListView,
    pub open_post: Option<i64>,
    pub live_comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionView {
    pub status: ConnectionStatus,
    pub attempt: u32,
    /// Debounced "reconnecting / disconnected" banner
    pub show_problem: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomListItem {
    pub id: i64,
    pub name: String,
    pub access: AccessPolicy,
    pub joined: bool,
    pub member_count: u32,
    pub evicted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoomView {
    pub id: i64,
    pub name: String,
    pub messages: Vec<Message>,
    pub roster: Vec<RosterMember>,
    pub composer: ComposerState,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedListView {
    pub key: FeedKey,
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub scroll: f64,
    pub loading: bool,
    pub has_more: bool,
}
