//! Notification Hub Tests

use std::collections::HashMap;

use chrono::Utc;
use pretty_assertions::assert_eq;

use community_session::domain::entities::{BroadcastRecord, ConnectionStatus, PushPayload};
use community_session::infrastructure::channel::InboundEvent;

use crate::common::*;

fn broadcast(recipient_ids: Option<HashMap<String, String>>) -> BroadcastRecord {
    BroadcastRecord {
        title: "Maintenance".into(),
        content: "<p>Back at <b>noon</b></p>".into(),
        sender_id: Some(1),
        created_at: Utc::now(),
        reference_id: None,
        recipient_ids,
    }
}

fn push(link: Option<&str>) -> PushPayload {
    PushPayload {
        title: "New reply".into(),
        body: "<i>Someone</i> replied".into(),
        link: link.map(str::to_string),
        notification_id: Some("n-1".into()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_inbox_loaded_on_login() {
    let api = FakeApi::new();
    *api.notifications.lock() = vec![notification("b"), notification("a"), notification("b")];
    let mut harness = Harness::with_api(api);

    let session = harness.login(7).await;
    let view = wait_for(&session, |v| !v.notifications.is_empty()).await;

    let ids: Vec<&str> = view.notifications.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(view.unread, 2);
}

#[tokio::test(start_paused = true)]
async fn test_live_notification_deduplicated_and_pulses() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;
    settle().await;

    harness.transport.push(InboundEvent::Notification(notification("n1")));
    harness.transport.push(InboundEvent::Notification(notification("n1")));

    let view = wait_for(&session, |v| v.unread == 1).await;
    assert_eq!(view.notifications.len(), 1);
    assert!(view.pulse);

    let view = wait_for(&session, |v| !v.pulse).await;
    assert_eq!(view.notifications.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_uses_recipient_id() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected).await;
    settle().await;
    let ids = HashMap::from([("7".to_string(), "bc-7".to_string())]);

    harness.transport.push(InboundEvent::Broadcast(broadcast(Some(ids.clone()))));
    harness.transport.push(InboundEvent::Broadcast(broadcast(Some(ids))));
    harness.transport.push(InboundEvent::Broadcast(broadcast(None)));

    let view = wait_for(&session, |v| v.notifications.len() == 2).await;
    assert_eq!(view.notifications[1].id, "bc-7");
    assert!(view.notifications[0].id.starts_with("local-"));
}

#[tokio::test(start_paused = true)]
async fn test_mark_read_is_optimistic() {
    let api = FakeApi::new();
    *api.notifications.lock() = vec![notification("a"), notification("b")];
    let mut harness = Harness::with_api(api.clone());
    let session = harness.login(7).await;
    wait_for(&session, |v| v.unread == 2).await;
    settle().await;

    session.mark_read("a").unwrap();
    let view = wait_for(&session, |v| v.unread == 1).await;
    assert!(view.notifications.iter().any(|n| n.id == "a" && n.read));

    session.mark_all_read().unwrap();
    wait_for(&session, |v| v.unread == 0).await;
    eventually(|| api.call_count("read:a") == 1 && api.call_count("read-all") == 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_marked_read_elsewhere_clears_unread() {
    let api = FakeApi::new();
    *api.notifications.lock() = vec![notification("a")];
    let mut harness = Harness::with_api(api);
    let session = harness.login(7).await;
    wait_for(&session, |v| v.unread == 1).await;
    settle().await;

    harness.transport.push(InboundEvent::NotificationsMarkedRead);

    wait_for(&session, |v| v.unread == 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_push_banner_and_routing() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;

    let banner = session.push_received(push(Some("/posts/3"))).await.unwrap();
    let banner = banner.expect("permission granted");
    assert_eq!(banner.body, "Someone replied");
    assert_eq!(banner.link.as_deref(), Some("/posts/3"));

    let route = session.push_opened(push(Some("/posts/3"))).await.unwrap();
    assert_eq!(route, "/posts/3");
    let route = session.push_opened(push(Some("https://elsewhere.example"))).await.unwrap();
    assert_eq!(route, "/notifications");

    let api = harness.api.clone();
    eventually(|| api.call_count("notifications") >= 3).await;
}

#[tokio::test(start_paused = true)]
async fn test_images_loaded_once() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;

    let first = session.load_image("/uploads/a.png").await.unwrap();
    let second = session.load_image("/uploads/a.png").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.api.call_count("blob:/uploads/a.png"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_in_flight_keeps_live_items_and_read_marks() {
    let api = FakeApi::new();
    *api.notifications.lock() = vec![notification("a")];
    let mut harness = Harness::with_api(api.clone());
    let session = harness.login(7).await;
    wait_for(&session, |v| v.connection.status == ConnectionStatus::Connected && v.unread == 1).await;
    settle().await;

    let before = api.call_count("notifications");
    let release = api.gate("notifications");
    session.refresh_notifications().unwrap();
    eventually(|| api.call_count("notifications") == before + 1).await;

    session.mark_read("a").unwrap();
    harness.transport.push(InboundEvent::Notification(notification("x")));
    wait_for(&session, |v| v.notifications.len() == 2 && v.unread == 1).await;
    release.send(()).expect("inbox refresh still pending");
    settle().await;

    let view = session.view();
    let inbox: Vec<(&str, bool)> = view.notifications.iter().map(|n| (n.id.as_str(), n.read)).collect();
    assert_eq!(inbox, vec![("x", false), ("a", true)]);
    assert_eq!(view.unread, 1);
}
