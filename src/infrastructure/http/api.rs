//! HTTP collaborator contract.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{FeedKey, Notification, PostPage, RoomState, RoomSummary};
use crate::shared::error::AppError;

/// Browser push subscription as produced by the platform push manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub keys: WebPushKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// REST endpoints the session layer consumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Ids of every identity currently online.
    async fn fetch_online_users(&self) -> Result<Vec<i64>, AppError>;

    async fn fetch_rooms(&self) -> Result<Vec<RoomSummary>, AppError>;

    /// Ask the server to add the local identity to a room.
    async fn join_room(&self, room_id: i64) -> Result<(), AppError>;

    /// History, roster and self-mute state of a room.
    async fn fetch_room_state(&self, room_id: i64) -> Result<RoomState, AppError>;

    async fn fetch_posts(
        &self,
        key: &FeedKey,
        page: u32,
        page_size: u32,
    ) -> Result<PostPage, AppError>;

    /// Most recent notifications, newest first.
    async fn fetch_notifications(&self, limit: usize) -> Result<Vec<Notification>, AppError>;

    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError>;

    async fn mark_all_notifications_read(&self) -> Result<(), AppError>;

    /// Register a native device token for out-of-band push.
    async fn register_device_token(&self, token: &str, platform: &str) -> Result<(), AppError>;

    /// VAPID public key for browser push.
    async fn fetch_push_public_key(&self) -> Result<String, AppError>;

    async fn subscribe_web_push(&self, subscription: &WebPushSubscription)
        -> Result<(), AppError>;

    /// Raw bytes of an image, absolute URL or API-relative path.
    async fn fetch_blob(&self, url: &str) -> Result<Bytes, AppError>;
}
