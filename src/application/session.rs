//! Session Runtime
//!
//! The single logical thread of a logged-in session. It owns presence, room,
//! notification, feed and post-scope state and processes one input at a
//! time: a channel event, a finished HTTP fetch, a user command, or a due
//! timer. Fetches run in a `JoinSet` so a slow one never holds up the events
//! queued behind it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::dto::{
    ActiveRoomView, ConnectionView, FeedListView, RoomListItem, SessionView,
};
use crate::application::services::{
    ConnectionMonitor, FeedNavigation, FeedSyncCache, NotificationHub, PostScope, PresenceTracker,
    RoomAction, RoomError, RoomSession, SessionChannel, SnapshotToken,
};
use crate::config::Settings;
use crate::domain::entities::{
    FeedKey, Identity, Message, Notification, PostPage, PushPayload, RoomState, RoomSummary,
};
use crate::infrastructure::channel::{InboundEvent, Subscription};
use crate::infrastructure::http::ApiClient;
use crate::infrastructure::platform::{Banner, Platform};
use crate::shared::error::AppError;

/// Idle wake-up when nothing is scheduled.
const IDLE_TICK: Duration = Duration::from_secs(3600);

/// User commands accepted by the runtime.
#[derive(Debug)]
pub enum SessionCommand {
    SelectRoom {
        room_id: i64,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    LeaveRoom,
    SendMessage {
        content: String,
        reply: oneshot::Sender<Result<Message, RoomError>>,
    },
    RefreshRooms,
    RefreshNotifications,
    MarkRead {
        id: String,
    },
    MarkAllRead,
    PushReceived {
        payload: PushPayload,
        reply: oneshot::Sender<Option<Banner>>,
    },
    PushOpened {
        payload: PushPayload,
        reply: oneshot::Sender<String>,
    },
    NavigateFeed {
        key: FeedKey,
        reply: oneshot::Sender<FeedNavigation>,
    },
    LoadMore,
    ReloadFeed,
    SaveFeedScroll {
        offset: f64,
    },
    OpenPost {
        post_id: i64,
    },
    ClosePost,
    Shutdown,
}

/// Result of a spawned fetch.
enum Completion {
    Presence {
        token: SnapshotToken,
        result: Result<Vec<i64>, AppError>,
    },
    Rooms {
        request: u64,
        result: Result<Vec<RoomSummary>, AppError>,
    },
    RoomState {
        room_id: i64,
        request: u64,
        joined_now: bool,
        result: Result<RoomState, AppError>,
    },
    Notifications {
        request: u64,
        result: Result<Vec<Notification>, AppError>,
    },
    FeedPage {
        key: FeedKey,
        page: u32,
        result: Result<PostPage, AppError>,
    },
    Acknowledged {
        what: &'static str,
        result: Result<(), AppError>,
    },
}

/// Wall-clock reading from the runtime's clock, so paused test time and
/// scheduled deadlines agree.
fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

enum Input {
    Event(InboundEvent),
    Completed(Result<Completion, JoinError>),
    Command(SessionCommand),
    Tick,
    Stop,
}

pub struct SessionRuntime {
    identity: Identity,
    api: Arc<dyn ApiClient>,
    monitor: ConnectionMonitor,
    events: Subscription,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    view_tx: watch::Sender<SessionView>,
    tasks: JoinSet<Completion>,
    presence: PresenceTracker,
    rooms: RoomSession,
    notifications: NotificationHub,
    feed: FeedSyncCache,
    post: PostScope,
    inbox_limit: usize,
}

impl SessionRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Identity,
        channel: &SessionChannel,
        events: Subscription,
        monitor: ConnectionMonitor,
        api: Arc<dyn ApiClient>,
        platform: Arc<dyn Platform>,
        settings: &Settings,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> (Self, watch::Receiver<SessionView>) {
        let (view_tx, view_rx) = watch::channel(SessionView {
            user_id: Some(identity.user_id),
            ..SessionView::default()
        });
        let runtime = Self {
            rooms: RoomSession::new(identity.clone(), channel.sender(), &settings.rooms),
            notifications: NotificationHub::new(identity.user_id, platform, &settings.notifications),
            feed: FeedSyncCache::new(&settings.feed),
            post: PostScope::new(channel.sender()),
            presence: PresenceTracker::new(),
            inbox_limit: settings.notifications.live_limit,
            identity,
            api,
            monitor,
            events,
            commands,
            view_tx,
            tasks: JoinSet::new(),
        };
        (runtime, view_rx)
    }

    pub async fn run(mut self) {
        let user_id = self.identity.user_id;
        info!(user_id, "Session runtime started");
        self.spawn_room_list();
        self.spawn_inbox();
        self.publish();

        loop {
            let now = clock_now();
            let wake = self.next_deadline(now).unwrap_or(now + IDLE_TICK);
            let input = tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => Input::Event(event),
                    None => Input::Stop,
                },
                Some(done) = self.tasks.join_next(), if !self.tasks.is_empty() => Input::Completed(done),
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => Input::Stop,
                    Some(command) => Input::Command(command),
                },
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => Input::Tick,
            };

            let now = clock_now();
            match input {
                Input::Event(event) => self.on_event(event, now),
                Input::Completed(Ok(completion)) => self.on_completion(completion, now),
                Input::Completed(Err(e)) => {
                    if e.is_panic() {
                        error!(user_id, error = %e, "Session fetch task panicked");
                    }
                }
                Input::Command(command) => self.on_command(command, now),
                Input::Tick => {}
                Input::Stop => break,
            }
            self.rooms.advance(now);
            self.notifications.advance(now);
            self.publish();
        }

        self.tasks.abort_all();
        self.presence.clear();
        self.rooms.clear();
        self.notifications.clear();
        self.feed.clear();
        self.view_tx.send_replace(SessionView::default());
        info!(user_id, "Session runtime stopped");
    }

    // =========================================================================
    // Channel events
    // =========================================================================

    fn on_event(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::Connect => {
                let token = self.presence.begin_snapshot();
                self.spawn_presence(token);
                if let Some(action) = self.rooms.on_connected() {
                    self.spawn_room_load(action);
                }
                self.post.on_connected();
                self.spawn_room_list();
                self.spawn_inbox();
            }
            InboundEvent::Reconnect => debug!(user_id = self.identity.user_id, "Channel resumed"),
            InboundEvent::Disconnect { .. } | InboundEvent::ReconnectFailed => {
                self.presence.clear();
            }
            InboundEvent::ConnectError { .. } | InboundEvent::ReconnectAttempt { .. } => {}

            InboundEvent::PresenceOnline { id } => self.presence.on_online(id),
            InboundEvent::PresenceOffline { id } => self.presence.on_offline(id),

            InboundEvent::RoomMessage { room_id, message } => {
                self.rooms.on_message(room_id, message);
            }
            InboundEvent::RoomError { room_id, error } => {
                self.rooms.on_room_error(room_id, &error, now);
            }
            InboundEvent::MemberKicked { room_id, reason } => {
                self.rooms.on_member_kicked(room_id, reason, now);
            }
            InboundEvent::RoomAccessChanged {
                room_id,
                access_type,
            } => self.rooms.on_access_changed(room_id, access_type),
            InboundEvent::RosterUpdated { room_id } => {
                if let Some(action) = self.rooms.on_roster_updated(room_id) {
                    self.spawn_room_load(action);
                }
            }

            InboundEvent::Notification(notification) => {
                self.notifications.on_live(notification, now);
            }
            InboundEvent::NotificationsMarkedRead => self.notifications.on_marked_read_elsewhere(),
            InboundEvent::Broadcast(record) => {
                self.notifications.on_broadcast(record, now);
            }

            InboundEvent::PostCreated(post) => {
                self.feed.on_post_created(post);
            }
            InboundEvent::PostLiked {
                post_id,
                like_count,
            } => {
                self.feed.on_post_liked(post_id, like_count);
            }
            InboundEvent::PostUpdated { post_id, post } => {
                self.feed.on_post_updated(post_id, post);
            }
            InboundEvent::PostDeleted { post_id } => {
                self.feed.on_post_deleted(post_id);
            }
            InboundEvent::CommentCountUpdated { post_id, count } => {
                self.feed.on_comment_count(post_id, count);
            }
            InboundEvent::CommentCreated(comment) => {
                self.post.on_comment_created(comment);
            }
        }
    }

    // =========================================================================
    // Fetch completions
    // =========================================================================

    fn on_completion(&mut self, completion: Completion, now: Instant) {
        let user_id = self.identity.user_id;
        match completion {
            Completion::Presence { token, result } => match result {
                Ok(ids) => {
                    self.presence.apply_snapshot(token, ids);
                }
                Err(e) => {
                    warn!(user_id, code = e.code(), error = %e, "Presence snapshot failed");
                    self.presence.abandon_snapshot(token);
                }
            },
            Completion::Rooms { request, result } => match result {
                Ok(rooms) => {
                    self.rooms.apply_room_list(request, rooms);
                }
                Err(e) => warn!(user_id, code = e.code(), error = %e, "Room list fetch failed"),
            },
            Completion::RoomState {
                room_id,
                request,
                joined_now,
                result,
            } => match result {
                Ok(state) => {
                    self.rooms.apply_state(room_id, request, joined_now, state);
                }
                Err(e) => {
                    self.rooms.fetch_failed(room_id, request, &e, now);
                }
            },
            Completion::Notifications { request, result } => match result {
                Ok(list) => {
                    self.notifications.apply_refresh(request, list);
                }
                Err(e) => warn!(user_id, code = e.code(), error = %e, "Inbox refresh failed"),
            },
            Completion::FeedPage { key, page, result } => match result {
                Ok(posts) => {
                    self.feed.apply_page(&key, posts);
                }
                Err(e) => {
                    warn!(user_id, filter = %key, page, code = e.code(), error = %e, "Feed page fetch failed");
                    self.feed.fetch_failed(&key, page);
                }
            },
            Completion::Acknowledged { what, result } => {
                if let Err(e) = result {
                    warn!(user_id, what, code = e.code(), error = %e, "Read-state sync failed; local state kept");
                }
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn on_command(&mut self, command: SessionCommand, now: Instant) {
        match command {
            SessionCommand::SelectRoom { room_id, reply } => {
                let result = match self.rooms.select(room_id) {
                    Ok(action) => {
                        self.spawn_room_load(action);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            SessionCommand::LeaveRoom => self.rooms.leave_active(),
            SessionCommand::SendMessage { content, reply } => {
                let _ = reply.send(self.rooms.send(&content));
            }
            SessionCommand::RefreshRooms => self.spawn_room_list(),
            SessionCommand::RefreshNotifications => self.spawn_inbox(),
            SessionCommand::MarkRead { id } => {
                if self.notifications.mark_read(&id) {
                    let api = self.api.clone();
                    self.tasks.spawn(async move {
                        Completion::Acknowledged {
                            what: "mark_read",
                            result: api.mark_notification_read(&id).await,
                        }
                    });
                }
            }
            SessionCommand::MarkAllRead => {
                self.notifications.mark_all_read();
                let api = self.api.clone();
                self.tasks.spawn(async move {
                    Completion::Acknowledged {
                        what: "mark_all_read",
                        result: api.mark_all_notifications_read().await,
                    }
                });
            }
            SessionCommand::PushReceived { payload, reply } => {
                let _ = reply.send(self.notifications.on_push(&payload));
            }
            SessionCommand::PushOpened { payload, reply } => {
                let _ = reply.send(NotificationHub::push_route(&payload));
                self.spawn_inbox();
            }
            SessionCommand::NavigateFeed { key, reply } => {
                let navigation = self.feed.navigate(key, now);
                if let FeedNavigation::Fetch { key, page } = &navigation {
                    self.spawn_feed_page(key.clone(), *page);
                }
                let _ = reply.send(navigation);
            }
            SessionCommand::LoadMore => {
                if let Some((key, page)) = self.feed.load_more() {
                    self.spawn_feed_page(key, page);
                }
            }
            SessionCommand::ReloadFeed => {
                if let FeedNavigation::Fetch { key, page } = self.feed.reload() {
                    self.spawn_feed_page(key, page);
                }
            }
            SessionCommand::SaveFeedScroll { offset } => self.feed.save_scroll(offset),
            SessionCommand::OpenPost { post_id } => self.post.open(post_id),
            SessionCommand::ClosePost => self.post.close(),
            SessionCommand::Shutdown => {}
        }
    }

    // =========================================================================
    // Fetches
    // =========================================================================

    fn spawn_presence(&mut self, token: SnapshotToken) {
        let api = self.api.clone();
        self.tasks.spawn(async move {
            Completion::Presence {
                token,
                result: api.fetch_online_users().await,
            }
        });
    }

    fn spawn_room_list(&mut self) {
        let api = self.api.clone();
        let request = self.rooms.begin_room_list();
        self.tasks.spawn(async move {
            Completion::Rooms {
                request,
                result: api.fetch_rooms().await,
            }
        });
    }

    fn spawn_room_load(&mut self, action: RoomAction) {
        let api = self.api.clone();
        self.tasks.spawn(async move {
            let room_id = action.room_id();
            let joined_now = matches!(action, RoomAction::JoinThenFetch { .. });
            let result = async {
                if joined_now {
                    api.join_room(room_id).await?;
                }
                api.fetch_room_state(room_id).await
            }
            .await;
            Completion::RoomState {
                room_id,
                request: action.request(),
                joined_now,
                result,
            }
        });
    }

    fn spawn_inbox(&mut self) {
        let api = self.api.clone();
        let limit = self.inbox_limit;
        let request = self.notifications.begin_refresh();
        self.tasks.spawn(async move {
            Completion::Notifications {
                request,
                result: api.fetch_notifications(limit).await,
            }
        });
    }

    fn spawn_feed_page(&mut self, key: FeedKey, page: u32) {
        let api = self.api.clone();
        let page_size = self.feed.page_size();
        self.tasks.spawn(async move {
            let result = api.fetch_posts(&key, page, page_size).await;
            Completion::FeedPage { key, page, result }
        });
    }

    // =========================================================================
    // View
    // =========================================================================

    fn next_deadline(&self, now: Instant) -> Option<Instant> {
        [
            self.rooms.next_deadline(),
            self.notifications.next_deadline(),
            self.monitor.indicator_deadline(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn publish(&self) {
        let now = clock_now();
        let active_room = self.rooms.active_room().map(|room| ActiveRoomView {
            id: room.id,
            name: room.name.clone(),
            messages: room.messages.clone(),
            roster: room.roster.clone(),
            composer: self.rooms.composer(),
            loading: self.rooms.is_loading(),
        });
        let feed = self.feed.current();
        let view = SessionView {
            user_id: Some(self.identity.user_id),
            connection: ConnectionView {
                status: self.monitor.status(),
                attempt: self.monitor.attempt(),
                show_problem: self.monitor.indicator_visible(now),
            },
            online: self.presence.online(),
            presence_loading: self.presence.is_loading(),
            rooms: self
                .rooms
                .rooms()
                .into_iter()
                .map(|room| RoomListItem {
                    id: room.id,
                    name: room.name.clone(),
                    access: room.access,
                    joined: room.joined,
                    member_count: room.member_count,
                    evicted: self.rooms.is_evicted(room.id),
                })
                .collect(),
            active_room,
            room_notice: self.rooms.notice().cloned(),
            notifications: self.notifications.items().to_vec(),
            unread: self.notifications.unread_count(),
            pulse: self.notifications.pulse_active(now),
            feed: FeedListView {
                key: feed.key.clone(),
                posts: feed.posts.clone(),
                page: feed.page,
                total_pages: feed.total_pages,
                scroll: feed.scroll,
                loading: feed.is_loading(),
                has_more: feed.has_more(),
            },
            open_post: self.post.open_post(),
            live_comments: self.post.comments().to_vec(),
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
