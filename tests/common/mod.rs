//! Common Test Utilities
//!
//! In-memory transport and API doubles, fixtures, and view helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use community_session::application::dto::SessionView;
use community_session::config::Settings;
use community_session::domain::entities::{
    AccessPolicy, ConfirmedMessage, Credential, FeedKey, Identity, Notification, NotificationType,
    PostPage, PostSummary, Privilege, RoomState, RoomSummary,
};
use community_session::infrastructure::channel::{
    ChannelError, InboundEvent, OutboundCommand, Transport, TransportLink,
};
use community_session::infrastructure::http::{ApiClient, CredentialProvider, WebPushSubscription};
use community_session::infrastructure::platform::{HeadlessPlatform, NotificationPermission};
use community_session::presentation::SessionHandle;
use community_session::shared::error::AppError;
use community_session::startup::Application;

// =============================================================================
// Transport
// =============================================================================

/// Transport whose dials follow a script. Accepted links keep their peer
/// ends so tests can push server events or hang up.
#[derive(Default)]
pub struct MemoryTransport {
    script: Mutex<VecDeque<Result<(), ChannelError>>>,
    peers: Mutex<Vec<mpsc::UnboundedSender<InboundEvent>>>,
    pub sent: Arc<Mutex<Vec<OutboundCommand>>>,
    pub dialed: Mutex<Vec<i64>>,
    pub dials: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue dial outcomes; unscripted dials succeed.
    pub fn script(&self, outcomes: Vec<Result<(), ChannelError>>) {
        self.script.lock().extend(outcomes);
    }

    /// Deliver a server event on the newest link.
    pub fn push(&self, event: InboundEvent) {
        if let Some(peer) = self.peers.lock().last() {
            let _ = peer.send(event);
        }
    }

    pub fn hang_up(&self, reason: &str) {
        self.push(InboundEvent::Disconnect {
            reason: reason.to_string(),
        });
    }

    pub fn sent(&self) -> Vec<OutboundCommand> {
        self.sent.lock().clone()
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        identity: &Identity,
        _credential: &Credential,
    ) -> Result<TransportLink, ChannelError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.dialed.lock().push(identity.user_id);
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(()));
        outcome?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.peers.lock().push(in_tx);
        let sent = self.sent.clone();
        let sink = tokio::spawn(async move {
            while let Some(command) = out_rx.recv().await {
                sent.lock().push(command);
            }
        });
        Ok(TransportLink::new(out_tx, in_rx).with_tasks(vec![sink]))
    }
}

// =============================================================================
// API
// =============================================================================

/// REST double backed by in-memory state.
#[derive(Default)]
pub struct FakeApi {
    pub online: Mutex<Vec<i64>>,
    /// Calls held until their sender fires, keyed like `calls`.
    pub gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    pub rooms: Mutex<Vec<RoomSummary>>,
    pub room_states: Mutex<HashMap<i64, RoomState>>,
    pub banned: Mutex<HashSet<i64>>,
    pub pages: Mutex<HashMap<u32, PostPage>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub calls: Mutex<Vec<String>>,
    pub refreshes: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    /// Hold the next presence snapshot; fire the returned sender to release it.
    pub fn gate_online(&self) -> oneshot::Sender<()> {
        self.gate("online")
    }

    /// Hold the next `call` until the returned sender fires. Room lists and
    /// inbox pages are read when the call is made, room state when released.
    pub fn gate(&self, call: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(call.to_string(), rx);
        tx
    }

    async fn pass(&self, call: &str) {
        let gate = self.gates.lock().remove(call);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn fetch_online_users(&self) -> Result<Vec<i64>, AppError> {
        self.record("online");
        self.pass("online").await;
        Ok(self.online.lock().clone())
    }

    async fn fetch_rooms(&self) -> Result<Vec<RoomSummary>, AppError> {
        self.record("rooms");
        let rooms = self.rooms.lock().clone();
        self.pass("rooms").await;
        Ok(rooms)
    }

    async fn join_room(&self, room_id: i64) -> Result<(), AppError> {
        self.record(format!("join:{room_id}"));
        if self.banned.lock().contains(&room_id) {
            return Err(AppError::AccessDenied("You have been banned from this room".into()));
        }
        if let Some(room) = self.rooms.lock().iter_mut().find(|r| r.id == room_id) {
            room.joined = true;
        }
        Ok(())
    }

    async fn fetch_room_state(&self, room_id: i64) -> Result<RoomState, AppError> {
        let call = format!("state:{room_id}");
        self.record(call.clone());
        self.pass(&call).await;
        self.room_states
            .lock()
            .get(&room_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("room {room_id}")))
    }

    async fn fetch_posts(
        &self,
        key: &FeedKey,
        page: u32,
        _page_size: u32,
    ) -> Result<PostPage, AppError> {
        self.record(format!("posts:{key}:{page}"));
        self.pages
            .lock()
            .get(&page)
            .cloned()
            .ok_or_else(|| AppError::TransientNetwork("no such page".into()))
    }

    async fn fetch_notifications(&self, _limit: usize) -> Result<Vec<Notification>, AppError> {
        self.record("notifications");
        let notifications = self.notifications.lock().clone();
        self.pass("notifications").await;
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        self.record(format!("read:{id}"));
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> Result<(), AppError> {
        self.record("read-all");
        Ok(())
    }

    async fn register_device_token(&self, token: &str, platform: &str) -> Result<(), AppError> {
        self.record(format!("device:{platform}:{token}"));
        Ok(())
    }

    async fn fetch_push_public_key(&self) -> Result<String, AppError> {
        Ok("BPublicKey".into())
    }

    async fn subscribe_web_push(&self, subscription: &WebPushSubscription) -> Result<(), AppError> {
        self.record(format!("web-push:{}", subscription.endpoint));
        Ok(())
    }

    async fn fetch_blob(&self, url: &str) -> Result<Bytes, AppError> {
        self.record(format!("blob:{url}"));
        Ok(Bytes::from(url.as_bytes().to_vec()))
    }
}

#[async_trait]
impl CredentialProvider for FakeApi {
    fn current(&self) -> Credential {
        Credential::new("token")
    }

    async fn refresh(&self) -> Result<Credential, AppError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(Credential::new("fresh"))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct Harness {
    pub app: Application,
    pub transport: Arc<MemoryTransport>,
    pub api: Arc<FakeApi>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_api(FakeApi::new())
    }

    pub fn with_api(api: Arc<FakeApi>) -> Self {
        let transport = MemoryTransport::new();
        let app = Application::with_components(
            Settings::default(),
            transport.clone(),
            api.clone(),
            api.clone(),
            Arc::new(HeadlessPlatform::new(NotificationPermission::Granted)),
        );
        Self {
            app,
            transport,
            api,
        }
    }

    pub async fn login(&mut self, user_id: i64) -> SessionHandle {
        self.app
            .login(identity(user_id))
            .await
            .expect("login should succeed")
    }
}

pub fn identity(user_id: i64) -> Identity {
    Identity::new(user_id, format!("user{user_id}"), Privilege::Member)
}

pub fn room(id: i64, access: AccessPolicy, joined: bool) -> RoomSummary {
    RoomSummary {
        id,
        name: format!("room-{id}"),
        access,
        joined,
        member_count: 3,
    }
}

pub fn room_state(muted: bool) -> RoomState {
    RoomState {
        messages: Vec::new(),
        roster: Vec::new(),
        muted,
    }
}

pub fn confirmed(id: i64, room_id: i64, author_id: i64, content: &str) -> ConfirmedMessage {
    ConfirmedMessage {
        id,
        room_id,
        author_id,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

pub fn post(id: i64, category: Option<&str>) -> PostSummary {
    PostSummary {
        id,
        category: category.map(str::to_string),
        title: format!("post {id}"),
        excerpt: String::new(),
        author_id: 1,
        like_count: 0,
        comment_count: 0,
        created_at: Utc::now(),
    }
}

pub fn notification(id: &str) -> Notification {
    Notification {
        id: id.to_string(),
        kind: NotificationType::Comment,
        title: "New comment".into(),
        content: "Someone replied".into(),
        sender_id: Some(9),
        read: false,
        created_at: Utc::now(),
        reference_id: Some("12".into()),
    }
}

// =============================================================================
// View helpers
// =============================================================================

/// Wait until the published view satisfies `predicate`.
pub async fn wait_for<F>(handle: &SessionHandle, mut predicate: F) -> SessionView
where
    F: FnMut(&SessionView) -> bool,
{
    let mut view = handle.watch();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            {
                let current = view.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            if view.changed().await.is_err() {
                panic!("session closed while waiting");
            }
        }
    })
    .await
    .expect("timed out waiting for session view")
}

/// Poll `condition` until it holds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held")
}

/// Let every ready task run. With paused time the clock only moves once the
/// runtime is idle, so this returns after in-flight work has drained.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
