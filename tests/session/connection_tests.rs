//! Connection Tests

use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use community_session::domain::entities::{AccessPolicy, ConnectionStatus};
use community_session::infrastructure::channel::{ChannelError, OutboundCommand};

use crate::common::*;

fn refused() -> Result<(), ChannelError> {
    Err(ChannelError::Transport("connection refused".into()))
}

#[tokio::test(start_paused = true)]
async fn test_login_connects() {
    let mut harness = Harness::new();

    let session = harness.login(7).await;
    let view = wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;

    assert_eq!(view.user_id, Some(7));
    assert_eq!(view.connection.attempt, 0);
    assert!(!view.connection.show_problem);
    assert_eq!(harness.app.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_counts_attempts_and_resets_on_success() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;

    harness.transport.script(vec![refused(), refused(), refused()]);
    harness.transport.hang_up("transport close");

    let view = wait_for(&session, |v| v.connection.attempt == 3).await;
    assert!(view.connection.status.is_problem());
    assert!(view.connection.show_problem);

    let view = wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;
    assert_eq!(view.connection.attempt, 0);
    assert!(!view.connection.show_problem);
    assert_eq!(harness.transport.dial_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_refreshes_credential_once() {
    let mut harness = Harness::new();
    harness
        .transport
        .script(vec![Err(ChannelError::AuthRejected("jwt expired".into()))]);

    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;

    assert_eq!(harness.api.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(harness.transport.dial_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_auth_rejection_gives_up() {
    let mut harness = Harness::new();
    harness.transport.script(vec![
        Err(ChannelError::AuthRejected("jwt expired".into())),
        Err(ChannelError::AuthRejected("jwt expired".into())),
    ]);

    let session = harness.login(7).await;
    let view = wait_for(&session, |v| v.connection.status == ConnectionStatus::Disconnected).await;

    assert_eq!(harness.api.refreshes.load(Ordering::SeqCst), 1);
    assert!(view.online.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_rejoins_and_refetches_active_room() {
    let mut harness = Harness::new();
    *harness.api.rooms.lock() = vec![room(5, AccessPolicy::Open, true)];
    harness.api.room_states.lock().insert(5, room_state(false));
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;
    session.select_room(5).await.unwrap();
    wait_for(&session, |v| v.active_room.as_ref().is_some_and(|r| !r.loading)).await;

    harness.transport.hang_up("ping timeout");
    wait_for(&session, |v| v.connection.status != ConnectionStatus::Connected).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;

    let transport = harness.transport.clone();
    eventually(|| {
        transport
            .sent()
            .iter()
            .filter(|c| **c == OutboundCommand::JoinRoom { room_id: 5 })
            .count()
            == 2
    })
    .await;
    let api = harness.api.clone();
    eventually(|| api.call_count("state:5") == 2).await;
}
