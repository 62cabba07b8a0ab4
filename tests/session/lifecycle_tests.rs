//! Login / Logout Lifecycle Tests

use pretty_assertions::assert_eq;

use community_session::domain::entities::{AccessPolicy, ConnectionStatus};
use community_session::presentation::HandleError;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_same_identity_reuses_session() {
    let mut harness = Harness::new();
    let first = harness.login(7).await;
    wait_for(&first, |v| v.connection.status == ConnectionStatus::Connected).await;

    let second = harness.login(7).await;

    assert!(!first.is_closed());
    assert_eq!(second.view().user_id, Some(7));
    assert_eq!(harness.transport.dial_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_identity_switch_tears_down_previous_session() {
    let mut harness = Harness::new();
    *harness.api.rooms.lock() = vec![room(5, AccessPolicy::Open, true)];
    let first = harness.login(1).await;
    wait_for(&first, |v| v.connection.status == ConnectionStatus::Connected && !v.rooms.is_empty())
        .await;

    let second = harness.login(2).await;
    let view = wait_for(&second, |v| v.connection.status == ConnectionStatus::Connected).await;

    assert_eq!(view.user_id, Some(2));
    assert_eq!(*harness.transport.dialed.lock(), vec![1, 2]);
    assert!(first.is_closed());
    assert_eq!(first.view().user_id, None);
    assert!(first.view().rooms.is_empty());
    assert_eq!(harness.app.identity().map(|i| i.user_id), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_logout_returns_to_idle() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;

    harness.app.logout().await;

    assert_eq!(harness.app.status(), ConnectionStatus::Idle);
    assert!(harness.app.session().is_none());
    let err = session.select_room(5).await.unwrap_err();
    assert!(matches!(err, HandleError::Closed));
    assert_eq!(session.view().user_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_logout_stops_reconnecting() {
    let mut harness = Harness::new();
    harness.transport.script(
        (0..20)
            .map(|_| Err(community_session::infrastructure::channel::ChannelError::Transport("down".into())))
            .collect(),
    );
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.attempt >= 1).await;

    harness.app.logout().await;
    let dials = harness.transport.dial_count();
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;

    assert_eq!(harness.transport.dial_count(), dials);
}
