//! Feed Sync Tests

use pretty_assertions::assert_eq;

use community_session::application::services::FeedNavigation;
use community_session::domain::entities::{FeedKey, PostPage};
use community_session::infrastructure::channel::{InboundEvent, OutboundCommand};

use crate::common::*;

fn seed_pages(harness: &Harness) {
    let mut pages = harness.api.pages.lock();
    pages.insert(
        1,
        PostPage {
            posts: vec![post(2, Some("news")), post(1, None)],
            page: 1,
            total_pages: 2,
        },
    );
    pages.insert(
        2,
        PostPage {
            posts: vec![post(0, None)],
            page: 2,
            total_pages: 2,
        },
    );
}

fn ids(posts: &[community_session::domain::entities::PostSummary]) -> Vec<i64> {
    posts.iter().map(|p| p.id).collect()
}

#[tokio::test(start_paused = true)]
async fn test_navigate_fetches_then_pages_append() {
    let mut harness = Harness::new();
    seed_pages(&harness);
    let session = harness.login(7).await;

    let navigation = session.navigate_feed(None, None).await.unwrap();
    assert_eq!(navigation, FeedNavigation::Fetch { key: FeedKey::all(), page: 1 });
    let view = wait_for(&session, |v| v.feed.posts.len() == 2 && !v.feed.loading).await;
    assert!(view.feed.has_more);

    session.load_more().unwrap();
    let view = wait_for(&session, |v| v.feed.posts.len() == 3).await;

    assert_eq!(ids(&view.feed.posts), vec![2, 1, 0]);
    assert!(!view.feed.has_more);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_post_created_is_ignored() {
    let mut harness = Harness::new();
    seed_pages(&harness);
    let session = harness.login(7).await;
    session.navigate_feed(None, None).await.unwrap();
    wait_for(&session, |v| v.feed.posts.len() == 2).await;

    harness.transport.push(InboundEvent::PostCreated(post(10, None)));
    harness.transport.push(InboundEvent::PostCreated(post(10, None)));
    harness.transport.push(InboundEvent::PostLiked { post_id: 1, like_count: 5 });

    let view = wait_for(&session, |v| {
        v.feed.posts.iter().any(|p| p.id == 1 && p.like_count == 5)
    })
    .await;
    assert_eq!(ids(&view.feed.posts), vec![10, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_returning_to_filter_restores_snapshot() {
    let mut harness = Harness::new();
    seed_pages(&harness);
    let session = harness.login(7).await;
    session.navigate_feed(None, None).await.unwrap();
    wait_for(&session, |v| v.feed.posts.len() == 2).await;
    session.save_feed_scroll(320.0).unwrap();

    let navigation = session.navigate_feed(Some("news"), None).await.unwrap();
    assert!(matches!(navigation, FeedNavigation::Fetch { .. }));
    wait_for(&session, |v| v.feed.key.category() == Some("news") && !v.feed.loading).await;

    let navigation = session.navigate_feed(Some(" "), Some("")).await.unwrap();
    assert_eq!(navigation, FeedNavigation::Restored);
    let view = wait_for(&session, |v| v.feed.key == FeedKey::all()).await;

    assert_eq!(view.feed.scroll, 320.0);
    assert_eq!(ids(&view.feed.posts), vec![2, 1]);
    assert_eq!(harness.api.call_count("posts:category=* search=:1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_search_results_not_extended_live() {
    let mut harness = Harness::new();
    seed_pages(&harness);
    let session = harness.login(7).await;
    session.navigate_feed(None, Some("rust")).await.unwrap();
    wait_for(&session, |v| v.feed.posts.len() == 2).await;

    harness.transport.push(InboundEvent::PostCreated(post(10, None)));
    harness.transport.push(InboundEvent::PostDeleted { post_id: 2 });

    let view = wait_for(&session, |v| v.feed.posts.len() == 1).await;
    assert_eq!(ids(&view.feed.posts), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_open_post_receives_live_comments() {
    let mut harness = Harness::new();
    let session = harness.login(7).await;

    session.open_post(12).unwrap();
    let transport = harness.transport.clone();
    eventually(|| transport.sent().contains(&OutboundCommand::JoinPostScope { post_id: 12 })).await;

    let comment = community_session::domain::entities::Comment {
        id: 1,
        post_id: 12,
        author_id: 3,
        content: "Nice".into(),
        created_at: chrono::Utc::now(),
    };
    harness.transport.push(InboundEvent::CommentCreated(comment.clone()));
    harness.transport.push(InboundEvent::CommentCreated(comment));

    let view = wait_for(&session, |v| !v.live_comments.is_empty()).await;
    assert_eq!(view.open_post, Some(12));
    assert_eq!(view.live_comments.len(), 1);

    session.close_post().unwrap();
    let view = wait_for(&session, |v| v.open_post.is_none()).await;
    assert!(view.live_comments.is_empty());
}
