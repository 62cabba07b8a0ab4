//! Chat message entity.
//!
//! A message is either tentative (created locally, shown before the server
//! confirms it) or confirmed (carries the server's id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a message in a room's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum MessageKey {
    /// Client-generated id, not yet confirmed.
    Tentative(Uuid),
    /// Server-assigned id.
    Confirmed(i64),
}

/// A message as held in a room's message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub key: MessageKey,
    pub room_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build an optimistic record with a locally unique id.
    pub fn tentative(room_id: i64, author_id: i64, content: impl Into<String>) -> Self {
        Self {
            key: MessageKey::Tentative(Uuid::new_v4()),
            room_id,
            author_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_tentative(&self) -> bool {
        matches!(self.key, MessageKey::Tentative(_))
    }

    pub fn confirmed_id(&self) -> Option<i64> {
        match self.key {
            MessageKey::Confirmed(id) => Some(id),
            MessageKey::Tentative(_) => None,
        }
    }

    /// Whether this is a pending send that a confirmed message from
    /// `author_id` with `content` would settle.
    pub fn awaits(&self, author_id: i64, content: &str) -> bool {
        self.is_tentative() && self.author_id == author_id && self.content == content
    }

    /// Tentative id, if this record is still awaiting confirmation.
    pub fn client_id(&self) -> Option<Uuid> {
        match self.key {
            MessageKey::Tentative(id) => Some(id),
            MessageKey::Confirmed(_) => None,
        }
    }
}

/// A server-confirmed message as delivered by history fetches and
/// `room-message` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedMessage {
    pub id: i64,
    pub room_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ConfirmedMessage> for Message {
    fn from(message: ConfirmedMessage) -> Self {
        Self {
            key: MessageKey::Confirmed(message.id),
            room_id: message.room_id,
            author_id: message.author_id,
            content: message.content,
            created_at: message.created_at,
        }
    }
}
