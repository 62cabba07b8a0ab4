//! Notification entities.
//!
//! Three origins feed the inbox: persisted live records, admin broadcasts and
//! out-of-band platform pushes. Only the first two land in the inbox directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification kinds known to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Comment,
    Like,
    Mention,
    Chat,
    Broadcast,
    Payment,
    #[default]
    #[serde(other)]
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Mention => "mention",
            Self::Chat => "chat",
            Self::Broadcast => "broadcast",
            Self::Payment => "payment",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted notification record. Identity key is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(rename = "isRead", default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

impl Notification {
    /// In-app route the notification opens.
    pub fn route(&self) -> String {
        match (self.kind, self.reference_id.as_deref()) {
            (NotificationType::Comment | NotificationType::Like | NotificationType::Mention, Some(post)) => {
                format!("/posts/{post}")
            }
            (NotificationType::Chat, Some(room)) => format!("/chat/{room}"),
            (NotificationType::Chat, None) => "/chat".to_string(),
            (NotificationType::Payment, _) => "/payments".to_string(),
            _ => "/notifications".to_string(),
        }
    }
}

/// Admin-wide announcement as delivered on the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecord {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sender_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Per-recipient persisted notification ids, keyed by user id.
    #[serde(default)]
    pub recipient_ids: Option<HashMap<String, String>>,
}

impl BroadcastRecord {
    /// The persisted id the server assigned to `user_id`, if it sent one.
    pub fn id_for(&self, user_id: i64) -> Option<&str> {
        self.recipient_ids
            .as_ref()
            .and_then(|ids| ids.get(&user_id.to_string()))
            .map(String::as_str)
    }

    pub fn into_notification(self, id: String) -> Notification {
        Notification {
            id,
            kind: NotificationType::Broadcast,
            title: self.title,
            content: self.content,
            sender_id: self.sender_id,
            read: false,
            created_at: self.created_at,
            reference_id: self.reference_id,
        }
    }
}

/// Payload of an out-of-band platform push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// In-app route to open on interaction.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub notification_id: Option<String>,
}
