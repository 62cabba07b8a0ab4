//! Presence Tests

use pretty_assertions::assert_eq;

use community_session::domain::entities::ConnectionStatus;
use community_session::infrastructure::channel::InboundEvent;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_snapshot_seeds_online_set() {
    let api = FakeApi::new();
    *api.online.lock() = vec![4, 2];
    let mut harness = Harness::with_api(api);

    let session = harness.login(7).await;

    let view = wait_for(&session, |v| v.online == vec![2, 4]).await;
    assert!(!view.presence_loading);
}

#[tokio::test(start_paused = true)]
async fn test_deltas_during_snapshot_are_replayed() {
    let api = FakeApi::new();
    *api.online.lock() = vec![1, 2];
    let release = api.gate_online();
    let mut harness = Harness::with_api(api);
    let session = harness.login(7).await;
    wait_for(&session, |v| v.presence_loading).await;

    harness.transport.push(InboundEvent::PresenceOnline { id: 3 });
    harness.transport.push(InboundEvent::PresenceOffline { id: 1 });
    wait_for(&session, |v| v.online == vec![3]).await;

    release.send(()).expect("snapshot still pending");
    let view = wait_for(&session, |v| !v.presence_loading).await;

    assert_eq!(view.online, vec![2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_and_reconnect_reseeds() {
    let api = FakeApi::new();
    *api.online.lock() = vec![1, 2];
    let mut harness = Harness::with_api(api.clone());
    let session = harness.login(7).await;
    wait_for(&session, |v| v.online == vec![1, 2]).await;

    *api.online.lock() = vec![2];
    harness.transport.hang_up("ping timeout");
    wait_for(&session, |v| v.online.is_empty()).await;

    let view = wait_for(&session, |v| {
        v.connection.status == ConnectionStatus::Connected && v.online == vec![2]
    })
    .await;
    assert_eq!(view.connection.attempt, 0);
    assert_eq!(api.call_count("online"), 2);
}
