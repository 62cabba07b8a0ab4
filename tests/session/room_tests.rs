//! Room Session Tests

use pretty_assertions::assert_eq;

use community_session::application::services::{ComposerBlock, ComposerState, RoomError, RoomNotice};
use community_session::domain::entities::{AccessPolicy, ConnectionStatus};
use community_session::infrastructure::channel::{InboundEvent, OutboundCommand};
use community_session::presentation::{HandleError, SessionHandle};

use crate::common::*;

async fn open_room(harness: &mut Harness, muted: bool) -> SessionHandle {
    *harness.api.rooms.lock() = vec![room(5, AccessPolicy::Open, true)];
    harness.api.room_states.lock().insert(5, room_state(muted));
    let session = harness.login(7).await;
    wait_for(&session, |v| {
        v.connection.status == ConnectionStatus::Connected && v.rooms.len() == 1
    })
    .await;
    settle().await;

    session.select_room(5).await.expect("room should open");
    wait_for(&session, |v| v.active_room.as_ref().is_some_and(|r| !r.loading)).await;
    let transport = harness.transport.clone();
    eventually(|| transport.sent().contains(&OutboundCommand::JoinRoom { room_id: 5 })).await;
    session
}

// =========================================================================
// Opening rooms
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_open_room_joins_then_fetches() {
    let mut harness = Harness::new();
    *harness.api.rooms.lock() = vec![room(8, AccessPolicy::Open, false)];
    harness.api.room_states.lock().insert(8, room_state(false));
    let session = harness.login(7).await;
    wait_for(&session, |v| v.rooms.len() == 1).await;

    session.select_room(8).await.unwrap();
    let view = wait_for(&session, |v| v.active_room.as_ref().is_some_and(|r| !r.loading)).await;

    let calls = harness.api.calls();
    let join = calls.iter().position(|c| c == "join:8").expect("join call");
    let state = calls.iter().position(|c| c == "state:8").expect("state call");
    assert!(join < state);
    assert!(view.rooms[0].joined);
    assert_eq!(view.active_room.unwrap().composer, ComposerState::Enabled);
}

#[tokio::test(start_paused = true)]
async fn test_invite_only_room_refused_without_network() {
    let mut harness = Harness::new();
    *harness.api.rooms.lock() = vec![room(6, AccessPolicy::Invite, false)];
    let session = harness.login(7).await;
    wait_for(&session, |v| v.rooms.len() == 1).await;

    let err = session.select_room(6).await.unwrap_err();

    assert!(matches!(err, HandleError::Room(RoomError::AccessDenied(6))));
    assert_eq!(harness.api.call_count("join:6"), 0);
    assert_eq!(harness.api.call_count("state:6"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_banned_join_is_treated_as_eviction() {
    let mut harness = Harness::new();
    *harness.api.rooms.lock() = vec![room(8, AccessPolicy::Open, false)];
    harness.api.banned.lock().insert(8);
    let session = harness.login(7).await;
    wait_for(&session, |v| v.rooms.len() == 1).await;

    session.select_room(8).await.unwrap();
    let view = wait_for(&session, |v| v.rooms.first().is_some_and(|r| r.evicted)).await;

    assert!(matches!(view.room_notice, Some(RoomNotice::Evicted { room_id: 8, .. })));
    assert_eq!(harness.api.call_count("state:8"), 0);
}

// =========================================================================
// Messages
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_optimistic_message_confirmed_once() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;

    let tentative = session.send_message("  hello  ").await.unwrap();
    assert!(tentative.is_tentative());
    assert_eq!(tentative.content, "hello");

    let echo = confirmed(100, 5, 7, "hello");
    harness.transport.push(InboundEvent::RoomMessage { room_id: 5, message: echo.clone() });
    harness.transport.push(InboundEvent::RoomMessage { room_id: 5, message: echo });
    harness.transport.push(InboundEvent::RoomMessage {
        room_id: 5,
        message: confirmed(101, 5, 9, "hi there"),
    });

    let view = wait_for(&session, |v| {
        v.active_room.as_ref().is_some_and(|r| r.messages.len() == 2)
    })
    .await;
    let ids: Vec<Option<i64>> = view
        .active_room
        .unwrap()
        .messages
        .iter()
        .map(|m| m.confirmed_id())
        .collect();
    assert_eq!(ids, vec![Some(100), Some(101)]);
    assert!(harness.transport.sent().iter().any(|c| matches!(
        c,
        OutboundCommand::SendRoomMessage { room_id: 5, content, .. } if content == "hello"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_muted_member_cannot_send() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, true).await;

    let view = session.view();
    assert_eq!(
        view.active_room.unwrap().composer,
        ComposerState::Disabled(ComposerBlock::Muted)
    );
    let err = session.send_message("hello").await.unwrap_err();
    assert!(matches!(err, HandleError::Room(RoomError::Muted)));
}

#[tokio::test(start_paused = true)]
async fn test_empty_message_rejected() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;

    let err = session.send_message("   ").await.unwrap_err();

    assert!(matches!(err, HandleError::Room(RoomError::EmptyMessage)));
}

// =========================================================================
// Moderation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_kick_closes_room_and_blocks_reentry() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;

    harness.transport.push(InboundEvent::MemberKicked {
        room_id: 5,
        reason: Some("Spamming".into()),
    });

    let view = wait_for(&session, |v| v.room_notice.is_some()).await;
    assert_eq!(
        view.room_notice,
        Some(RoomNotice::Evicted { room_id: 5, reason: "Spamming".into() })
    );
    assert_eq!(
        view.active_room.unwrap().composer,
        ComposerState::Disabled(ComposerBlock::Evicted)
    );
    assert!(view.rooms[0].evicted);
    assert!(!view.rooms[0].joined);
    assert_eq!(view.rooms[0].member_count, 2);

    let view = wait_for(&session, |v| v.active_room.is_none()).await;
    assert_eq!(view.room_notice, None);

    let err = session.select_room(5).await.unwrap_err();
    assert!(matches!(err, HandleError::Room(RoomError::Evicted(5))));
    let transport = harness.transport.clone();
    eventually(|| transport.sent().contains(&OutboundCommand::LeaveRoom { room_id: 5 })).await;
}

#[tokio::test(start_paused = true)]
async fn test_room_error_with_eviction_text_evicts() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;

    harness.transport.push(InboundEvent::RoomError {
        room_id: 5,
        error: "You have been removed from this room".into(),
    });

    let view = wait_for(&session, |v| v.rooms.first().is_some_and(|r| r.evicted)).await;
    assert!(matches!(view.room_notice, Some(RoomNotice::Evicted { room_id: 5, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_server_rejoin_lifts_eviction() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;
    harness.transport.push(InboundEvent::MemberKicked { room_id: 5, reason: None });
    wait_for(&session, |v| v.active_room.is_none()).await;

    session.refresh_rooms().unwrap();
    let view = wait_for(&session, |v| v.rooms.first().is_some_and(|r| !r.evicted)).await;

    assert!(view.rooms[0].joined);
    session.select_room(5).await.expect("re-invited member may reopen the room");
}

#[tokio::test(start_paused = true)]
async fn test_generic_room_error_dismisses_itself() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;

    harness.transport.push(InboundEvent::RoomError {
        room_id: 5,
        error: "Message too long".into(),
    });
    let view = wait_for(&session, |v| v.room_notice.is_some()).await;
    assert!(matches!(view.room_notice, Some(RoomNotice::Error { room_id: 5, .. })));
    assert_eq!(view.active_room.unwrap().composer, ComposerState::Enabled);

    let view = wait_for(&session, |v| v.room_notice.is_none()).await;
    assert!(view.active_room.is_some());
}

// =========================================================================
// Interleavings
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_room_list_in_flight_during_kick_keeps_eviction() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;
    let api = harness.api.clone();
    let before = api.call_count("rooms");
    let release = api.gate("rooms");
    session.refresh_rooms().unwrap();
    eventually(|| api.call_count("rooms") == before + 1).await;

    harness.transport.push(InboundEvent::MemberKicked { room_id: 5, reason: None });
    wait_for(&session, |v| v.active_room.is_none()).await;
    release.send(()).expect("room list still pending");
    settle().await;

    let view = session.view();
    assert!(view.rooms[0].evicted);
    assert!(!view.rooms[0].joined);
    let err = session.select_room(5).await.unwrap_err();
    assert!(matches!(err, HandleError::Room(RoomError::Evicted(5))));
    assert_eq!(api.call_count("state:5"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_during_refetch_settles_once() {
    let mut harness = Harness::new();
    let session = open_room(&mut harness, false).await;
    let api = harness.api.clone();
    let release = api.gate("state:5");

    harness.transport.push(InboundEvent::RosterUpdated { room_id: 5 });
    eventually(|| api.call_count("state:5") == 2).await;
    session.send_message("hello").await.unwrap();
    api.room_states
        .lock()
        .get_mut(&5)
        .expect("room state")
        .messages
        .push(confirmed(50, 5, 7, "hello"));
    release.send(()).expect("refetch still pending");
    wait_for(&session, |v| {
        v.active_room
            .as_ref()
            .is_some_and(|r| !r.loading && r.messages.iter().any(|m| m.confirmed_id() == Some(50)))
    })
    .await;

    harness.transport.push(InboundEvent::RoomMessage {
        room_id: 5,
        message: confirmed(50, 5, 7, "hello"),
    });
    settle().await;

    let messages = session.view().active_room.unwrap().messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].confirmed_id(), Some(50));
}
