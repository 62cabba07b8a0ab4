//! Room Session
//!
//! Chat room membership, optimistic sending and the moderation protocol.
//!
//! Eviction is a state machine driven by one [`Schedule`]: the kick (or an
//! inline error carrying a kick signature) takes effect immediately
//! (unsubscribe, flag, composer disabled) and a single `ClearActive`
//! transition closes the room view once the notice interval has elapsed.
//! Handlers are idempotent, so the kick/error pair may arrive in any order or
//! twice.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RoomSettings;
use crate::domain::entities::{
    AccessPolicy, ConfirmedMessage, Identity, Message, Room, RoomState, RoomSummary,
};
use crate::domain::services::{merge_confirmed, JoinDecision, MergeDecision, ModerationService, Refusal};
use crate::infrastructure::channel::{ChannelSender, OutboundCommand};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::schedule::Schedule;

/// Room errors surfaced inline to the room view
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room {0} not found")]
    NotFound(i64),

    #[error("Room {0} is invite-only")]
    AccessDenied(i64),

    #[error("You were removed from room {0}")]
    Evicted(i64),

    #[error("You are muted in this room")]
    Muted,

    #[error("No room is open")]
    NoActiveRoom,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("{0}")]
    Api(String),
}

/// Network work the runtime must perform after a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    /// Fetch history, roster and mute state.
    Fetch { room_id: i64, request: u64 },
    /// Join through the API, then fetch.
    JoinThenFetch { room_id: i64, request: u64 },
}

impl RoomAction {
    pub fn room_id(&self) -> i64 {
        match self {
            Self::Fetch { room_id, .. } | Self::JoinThenFetch { room_id, .. } => *room_id,
        }
    }

    pub fn request(&self) -> u64 {
        match self {
            Self::Fetch { request, .. } | Self::JoinThenFetch { request, .. } => *request,
        }
    }
}

/// Transient message shown in the room view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    Error { room_id: i64, message: String },
    Evicted { room_id: i64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerBlock {
    Muted,
    Evicted,
}

/// State of the message-composition input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Hidden,
    Enabled,
    Disabled(ComposerBlock),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RoomTimer {
    ClearActive(i64),
    DismissNotice,
}

/// Client-side state of every room the session knows about.
pub struct RoomSession {
    identity: Identity,
    outbox: ChannelSender,
    rooms: HashMap<i64, Room>,
    /// Evicted rooms, with the last room-list request issued before the
    /// eviction. Only a list requested later can lift it.
    evicted: HashMap<i64, u64>,
    subscribed: HashSet<i64>,
    active: Option<i64>,
    loading: Option<(i64, u64)>,
    next_request: u64,
    list_requests: u64,
    list_applied: u64,
    notice: Option<RoomNotice>,
    schedule: Schedule<RoomTimer>,
    eviction_notice: Duration,
    error_dismiss: Duration,
}

impl RoomSession {
    pub fn new(identity: Identity, outbox: ChannelSender, settings: &RoomSettings) -> Self {
        Self {
            identity,
            outbox,
            rooms: HashMap::new(),
            evicted: HashMap::new(),
            subscribed: HashSet::new(),
            active: None,
            loading: None,
            next_request: 0,
            list_requests: 0,
            list_applied: 0,
            notice: None,
            schedule: Schedule::new(),
            eviction_notice: settings.eviction_notice(),
            error_dismiss: settings.error_dismiss(),
        }
    }

    // =========================================================================
    // Room list
    // =========================================================================

    /// Tag a room-list fetch about to be issued.
    pub fn begin_room_list(&mut self) -> u64 {
        self.list_requests += 1;
        self.list_requests
    }

    /// Merge the server's room list fetched under `request`.
    ///
    /// A room listed as joined is the server confirming membership, which is
    /// the only thing that lifts a local eviction, and only when the list was
    /// requested after the eviction. Lists older than one already applied
    /// are dropped.
    pub fn apply_room_list(&mut self, request: u64, summaries: Vec<RoomSummary>) -> bool {
        if request < self.list_applied {
            debug!(request, applied = self.list_applied, "Dropping stale room list");
            return false;
        }
        self.list_applied = request;
        for summary in summaries {
            let lifts = self
                .evicted
                .get(&summary.id)
                .is_some_and(|issued| summary.joined && request > *issued);
            if lifts {
                self.evicted.remove(&summary.id);
                info!(room_id = summary.id, "Re-invite confirmed, eviction lifted");
            }
            match self.rooms.get_mut(&summary.id) {
                Some(room) => {
                    let evicted = self.evicted.contains_key(&summary.id);
                    room.update_summary(summary);
                    if evicted {
                        room.joined = false;
                    }
                }
                None => {
                    self.rooms.insert(summary.id, Room::from_summary(summary));
                }
            }
        }
        true
    }

    /// Rooms ordered by id.
    pub fn rooms(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    pub fn room(&self, room_id: i64) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn active_room(&self) -> Option<&Room> {
        self.active.and_then(|id| self.rooms.get(&id))
    }

    pub fn active_id(&self) -> Option<i64> {
        self.active
    }

    pub fn is_evicted(&self, room_id: i64) -> bool {
        self.evicted.contains_key(&room_id)
    }

    pub fn is_subscribed(&self, room_id: i64) -> bool {
        self.subscribed.contains(&room_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn notice(&self) -> Option<&RoomNotice> {
        self.notice.as_ref()
    }

    // =========================================================================
    // Selection and loading
    // =========================================================================

    /// Open a room. Refusals never reach the network.
    pub fn select(&mut self, room_id: i64) -> Result<RoomAction, RoomError> {
        let room = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let decision =
            ModerationService::evaluate_join(room, self.evicted.contains_key(&room_id), &self.identity);

        let action = match decision {
            JoinDecision::Refuse(Refusal::Evicted) => {
                debug!(room_id, "Selection of evicted room refused");
                return Err(RoomError::Evicted(room_id));
            }
            JoinDecision::Refuse(Refusal::InviteOnly) => return Err(RoomError::AccessDenied(room_id)),
            JoinDecision::AlreadyMember => RoomAction::Fetch {
                room_id,
                request: self.next_request(),
            },
            JoinDecision::Join => RoomAction::JoinThenFetch {
                room_id,
                request: self.next_request(),
            },
        };

        if let Some(previous) = self.active.filter(|id| *id != room_id) {
            self.unsubscribe(previous);
        }
        self.active = Some(room_id);
        self.loading = Some((room_id, action.request()));
        if matches!(self.notice, Some(RoomNotice::Error { .. })) {
            self.dismiss_notice();
        }
        Ok(action)
    }

    /// Apply fetched room state. Results for a superseded request, or for a
    /// room evicted while the fetch was in flight, are dropped.
    pub fn apply_state(&mut self, room_id: i64, request: u64, joined_now: bool, state: RoomState) -> bool {
        if self.loading != Some((room_id, request)) {
            debug!(room_id, request, "Dropping stale room state");
            return false;
        }
        self.loading = None;
        if self.evicted.contains_key(&room_id) {
            return false;
        }
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        if joined_now && !room.joined {
            room.member_count += 1;
        }
        room.joined = true;
        room.apply_state(state);

        if self.active == Some(room_id) && self.subscribed.insert(room_id) {
            self.outbox.emit(OutboundCommand::JoinRoom { room_id });
        }
        true
    }

    /// A join or fetch failed. Eviction-class failures drive the eviction
    /// transition; anything else becomes a dismissable notice.
    pub fn fetch_failed(&mut self, room_id: i64, request: u64, error: &AppError, now: Instant) -> Option<RoomError> {
        if self.loading != Some((room_id, request)) {
            return None;
        }
        self.loading = None;
        let message = error.to_string();
        if ModerationService::is_eviction_error(&message) {
            self.evict(room_id, Some(message), now);
            return Some(RoomError::Evicted(room_id));
        }
        let surfaced = match error {
            AppError::AccessDenied(_) => RoomError::AccessDenied(room_id),
            AppError::NotFound(_) => RoomError::NotFound(room_id),
            _ => RoomError::Api(message),
        };
        warn!(room_id, code = error.code(), error = %surfaced, "Room load failed");
        self.show_error(room_id, surfaced.to_string(), now);
        Some(surfaced)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Append an optimistic record to the active room and transmit it.
    pub fn send(&mut self, content: &str) -> Result<Message, RoomError> {
        let room_id = self.active.ok_or(RoomError::NoActiveRoom)?;
        match self.composer() {
            ComposerState::Enabled => {}
            ComposerState::Disabled(ComposerBlock::Muted) => return Err(RoomError::Muted),
            ComposerState::Disabled(ComposerBlock::Evicted) => return Err(RoomError::Evicted(room_id)),
            ComposerState::Hidden => return Err(RoomError::NoActiveRoom),
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(RoomError::EmptyMessage);
        }

        let message = Message::tentative(room_id, self.identity.user_id, content);
        let client_id = message.client_id().unwrap_or_default();
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::NotFound(room_id))?;
        room.messages.push(message.clone());
        self.outbox.emit(OutboundCommand::SendRoomMessage {
            room_id,
            content: content.to_string(),
            client_id,
        });
        Ok(message)
    }

    /// Merge a confirmed message. Rooms we are not subscribed to are ignored.
    pub fn on_message(&mut self, room_id: i64, message: ConfirmedMessage) -> Option<MergeDecision> {
        if !self.subscribed.contains(&room_id) {
            return None;
        }
        let room = self.rooms.get_mut(&room_id)?;
        let decision = merge_confirmed(&mut room.messages, message);
        if decision == MergeDecision::Ignore {
            metrics::record_duplicate("room_message");
        }
        Some(decision)
    }

    // =========================================================================
    // Moderation
    // =========================================================================

    pub fn on_room_error(&mut self, room_id: i64, error: &str, now: Instant) {
        if ModerationService::is_eviction_error(error) {
            self.evict(room_id, Some(error.to_string()), now);
        } else if self.active == Some(room_id) {
            self.show_error(room_id, error.to_string(), now);
        } else {
            debug!(room_id, error, "Error for a room not on screen");
        }
    }

    pub fn on_member_kicked(&mut self, room_id: i64, reason: Option<String>, now: Instant) {
        self.evict(room_id, reason, now);
    }

    /// Forced eviction. Returns false if the room was already evicted.
    pub fn evict(&mut self, room_id: i64, reason: Option<String>, now: Instant) -> bool {
        if self.evicted.contains_key(&room_id) {
            return false;
        }
        self.evicted.insert(room_id, self.list_requests);
        self.unsubscribe(room_id);
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.joined = false;
            room.decrement_members();
        }
        if self.loading.map(|(id, _)| id) == Some(room_id) {
            self.loading = None;
        }
        metrics::record_eviction();
        info!(room_id, reason = reason.as_deref().unwrap_or(""), "Evicted from room");

        if self.active == Some(room_id) {
            self.schedule.cancel(&RoomTimer::DismissNotice);
            self.notice = Some(RoomNotice::Evicted {
                room_id,
                reason: reason.unwrap_or_else(|| "You were removed from this room".to_string()),
            });
            self.schedule
                .schedule(now + self.eviction_notice, RoomTimer::ClearActive(room_id));
        }
        true
    }

    /// Only the cached policy changes; membership is untouched.
    pub fn on_access_changed(&mut self, room_id: i64, access: AccessPolicy) {
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.access = access;
        }
    }

    /// The roster of a room changed. The active room is re-fetched in full.
    pub fn on_roster_updated(&mut self, room_id: i64) -> Option<RoomAction> {
        if self.active != Some(room_id) || self.evicted.contains_key(&room_id) {
            return None;
        }
        Some(self.refetch(room_id))
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Rejoin subscribed rooms on a fresh connection and re-fetch the active
    /// one, since history is never diffed across a gap.
    pub fn on_connected(&mut self) -> Option<RoomAction> {
        let mut rooms: Vec<i64> = self.subscribed.iter().copied().collect();
        rooms.sort_unstable();
        for room_id in rooms {
            self.outbox.emit(OutboundCommand::JoinRoom { room_id });
        }
        let room_id = self.active.filter(|id| !self.evicted.contains_key(id))?;
        Some(self.refetch(room_id))
    }

    /// Close the room view and stop listening to it.
    pub fn leave_active(&mut self) {
        if let Some(room_id) = self.active.take() {
            self.unsubscribe(room_id);
            self.schedule.cancel(&RoomTimer::ClearActive(room_id));
        }
        self.loading = None;
        self.dismiss_notice();
    }

    pub fn composer(&self) -> ComposerState {
        match self.active.and_then(|id| self.rooms.get(&id)) {
            None => ComposerState::Hidden,
            Some(room) if self.evicted.contains_key(&room.id) => {
                ComposerState::Disabled(ComposerBlock::Evicted)
            }
            Some(room) if room.muted => ComposerState::Disabled(ComposerBlock::Muted),
            Some(_) => ComposerState::Enabled,
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    pub fn next_deadline(&self) -> Option<Instant> {
        self.schedule.next_deadline()
    }

    /// Run due transitions. Returns whether anything changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        let due = self.schedule.drain_due(now);
        let changed = !due.is_empty();
        for timer in due {
            match timer {
                RoomTimer::ClearActive(room_id) => {
                    if self.active == Some(room_id) {
                        self.active = None;
                    }
                    if matches!(&self.notice, Some(RoomNotice::Evicted { room_id: id, .. }) if *id == room_id) {
                        self.notice = None;
                    }
                }
                RoomTimer::DismissNotice => {
                    if matches!(self.notice, Some(RoomNotice::Error { .. })) {
                        self.notice = None;
                    }
                }
            }
        }
        changed
    }

    /// Drop everything; the session is over.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.evicted.clear();
        self.subscribed.clear();
        self.active = None;
        self.loading = None;
        self.notice = None;
        self.schedule.clear();
    }

    fn next_request(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn refetch(&mut self, room_id: i64) -> RoomAction {
        let request = self.next_request();
        self.loading = Some((room_id, request));
        RoomAction::Fetch { room_id, request }
    }

    fn unsubscribe(&mut self, room_id: i64) {
        if self.subscribed.remove(&room_id) {
            self.outbox.emit(OutboundCommand::LeaveRoom { room_id });
        }
    }

    fn show_error(&mut self, room_id: i64, message: String, now: Instant) {
        if matches!(self.notice, Some(RoomNotice::Evicted { .. })) {
            return;
        }
        self.notice = Some(RoomNotice::Error { room_id, message });
        self.schedule
            .schedule(now + self.error_dismiss, RoomTimer::DismissNotice);
    }

    fn dismiss_notice(&mut self) {
        self.schedule.cancel(&RoomTimer::DismissNotice);
        self.notice = None;
    }
}
