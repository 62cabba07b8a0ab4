//! Session Handle
//!
//! The surface UI code talks to. Commands are forwarded to the session
//! runtime; the latest [`SessionView`] is observed through a watch channel.
//! Device registration and image loading go straight to the API since they
//! touch no session state.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument};

use crate::application::dto::SessionView;
use crate::application::services::{FeedNavigation, RoomError};
use crate::application::session::SessionCommand;
use crate::domain::entities::{FeedKey, Message, PushPayload};
use crate::infrastructure::cache::{BlobCache, ScrollMemory};
use crate::infrastructure::http::{ApiClient, WebPushSubscription};
use crate::infrastructure::platform::Banner;
use crate::shared::error::AppError;

/// Session handle errors
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Session is closed")]
    Closed,

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Api(#[from] AppError),
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    api: Arc<dyn ApiClient>,
    blobs: Arc<BlobCache>,
    scroll: Arc<ScrollMemory>,
}

impl SessionHandle {
    pub fn new(
        commands: mpsc::UnboundedSender<SessionCommand>,
        view: watch::Receiver<SessionView>,
        api: Arc<dyn ApiClient>,
        blobs: Arc<BlobCache>,
        scroll: Arc<ScrollMemory>,
    ) -> Self {
        Self {
            commands,
            view,
            api,
            blobs,
            scroll,
        }
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    // =========================================================================
    // Rooms
    // =========================================================================

    pub async fn select_room(&self, room_id: i64) -> Result<(), HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::SelectRoom { room_id, reply })?;
        Ok(rx.await.map_err(|_| HandleError::Closed)??)
    }

    pub fn leave_room(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::LeaveRoom)
    }

    /// Send a message to the open room. Returns the optimistic record.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<Message, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::SendMessage {
            content: content.into(),
            reply,
        })?;
        Ok(rx.await.map_err(|_| HandleError::Closed)??)
    }

    pub fn refresh_rooms(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::RefreshRooms)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn refresh_notifications(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::RefreshNotifications)
    }

    pub fn mark_read(&self, id: impl Into<String>) -> Result<(), HandleError> {
        self.send(SessionCommand::MarkRead { id: id.into() })
    }

    pub fn mark_all_read(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::MarkAllRead)
    }

    /// A push arrived while the app is in the foreground. Returns the banner
    /// that was shown, if any.
    pub async fn push_received(&self, payload: PushPayload) -> Result<Option<Banner>, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::PushReceived { payload, reply })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    /// The user opened a push. Returns the route to navigate to.
    pub async fn push_opened(&self, payload: PushPayload) -> Result<String, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::PushOpened { payload, reply })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    #[instrument(skip(self, token))]
    pub async fn register_device_token(&self, token: &str, platform: &str) -> Result<(), HandleError> {
        self.api.register_device_token(token, platform).await?;
        Ok(())
    }

    pub async fn push_public_key(&self) -> Result<String, HandleError> {
        Ok(self.api.fetch_push_public_key().await?)
    }

    #[instrument(skip_all)]
    pub async fn subscribe_web_push(&self, subscription: &WebPushSubscription) -> Result<(), HandleError> {
        self.api.subscribe_web_push(subscription).await?;
        Ok(())
    }

    // =========================================================================
    // Feed
    // =========================================================================

    pub async fn navigate_feed(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<FeedNavigation, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::NavigateFeed {
            key: FeedKey::new(category, search),
            reply,
        })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    pub fn load_more(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::LoadMore)
    }

    pub fn reload_feed(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::ReloadFeed)
    }

    pub fn save_feed_scroll(&self, offset: f64) -> Result<(), HandleError> {
        self.send(SessionCommand::SaveFeedScroll { offset })
    }

    pub fn open_post(&self, post_id: i64) -> Result<(), HandleError> {
        self.send(SessionCommand::OpenPost { post_id })
    }

    pub fn close_post(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::ClosePost)
    }

    // =========================================================================
    // Media and navigation
    // =========================================================================

    /// Image bytes, served from memory after the first load.
    pub async fn load_image(&self, url: &str) -> Result<Bytes, HandleError> {
        let api = self.api.clone();
        let bytes = self
            .blobs
            .get_or_load(url, || async move { api.fetch_blob(url).await })
            .await?;
        Ok(bytes)
    }

    pub fn save_route_scroll(&self, route: &str, offset: f64) {
        self.scroll.save(route, offset);
    }

    pub fn route_scroll(&self, route: &str) -> f64 {
        self.scroll.restore(route)
    }

    pub(crate) fn shutdown(&self) {
        debug!("Requesting session shutdown");
        let _ = self.commands.send(SessionCommand::Shutdown);
    }

    fn send(&self, command: SessionCommand) -> Result<(), HandleError> {
        self.commands.send(command).map_err(|_| HandleError::Closed)
    }
}
