//! Feed Sync Cache
//!
//! The displayed feed plus snapshots of recently left filters.
//!
//! Each snapshot is keyed by the exact (category, search) pair and expires
//! after the configured TTL. Paginated fetches append to the displayed list;
//! live events mutate only the displayed list.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::FeedSettings;
use crate::domain::entities::{FeedKey, PostPage, PostSummary};
use crate::infrastructure::metrics;

/// A saved feed list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub scroll: f64,
    pub written_at: Instant,
    /// Posts that arrived live rather than through a page fetch.
    pub live: HashSet<i64>,
}

/// Outcome of navigating to a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNavigation {
    /// Served from a live snapshot, including scroll position.
    Restored,
    /// Nothing usable cached; fetch the given page.
    Fetch { key: FeedKey, page: u32 },
}

/// The list currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub key: FeedKey,
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub scroll: f64,
    loading: Option<u32>,
    live: HashSet<i64>,
}

impl FeedView {
    fn empty(key: FeedKey) -> Self {
        Self {
            key,
            posts: Vec::new(),
            page: 0,
            total_pages: 0,
            scroll: 0.0,
            loading: None,
            live: HashSet::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

pub struct FeedSyncCache {
    ttl: Duration,
    max_posts: usize,
    page_size: u32,
    snapshots: HashMap<FeedKey, FeedSnapshot>,
    current: FeedView,
}

impl FeedSyncCache {
    pub fn new(settings: &FeedSettings) -> Self {
        Self {
            ttl: settings.ttl(),
            max_posts: settings.max_posts,
            page_size: settings.page_size.max(1),
            snapshots: HashMap::new(),
            current: FeedView::empty(FeedKey::all()),
        }
    }

    pub fn current(&self) -> &FeedView {
        &self.current
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// A live snapshot for `key`. Expired entries are dropped and reported
    /// as a miss.
    pub fn get(&mut self, key: &FeedKey, now: Instant) -> Option<&FeedSnapshot> {
        let expired = self
            .snapshots
            .get(key)
            .is_some_and(|s| now.saturating_duration_since(s.written_at) >= self.ttl);
        if expired {
            trace!(filter = %key, "Feed snapshot expired");
            self.snapshots.remove(key);
        }
        self.snapshots.get(key)
    }

    /// Switch the displayed list to `key`, saving the one being left.
    pub fn navigate(&mut self, key: FeedKey, now: Instant) -> FeedNavigation {
        if key == self.current.key && (self.current.page > 0 || self.current.is_loading()) {
            return FeedNavigation::Restored;
        }
        self.snapshot_current(now);
        self.prune(now);

        if let Some(snapshot) = self.get(&key, now).cloned() {
            debug!(filter = %key, posts = snapshot.posts.len(), "Feed restored from cache");
            self.current = FeedView {
                key,
                posts: snapshot.posts,
                page: snapshot.page,
                total_pages: snapshot.total_pages,
                scroll: snapshot.scroll,
                loading: None,
                live: snapshot.live,
            };
            return FeedNavigation::Restored;
        }

        self.current = FeedView::empty(key.clone());
        self.current.loading = Some(1);
        FeedNavigation::Fetch { key, page: 1 }
    }

    /// Re-fetch the displayed filter from page one.
    pub fn reload(&mut self) -> FeedNavigation {
        self.current.loading = Some(1);
        FeedNavigation::Fetch {
            key: self.current.key.clone(),
            page: 1,
        }
    }

    /// The end-of-list sentinel became visible. Returns the next page to
    /// fetch, unless one is in flight or the list is complete.
    pub fn load_more(&mut self) -> Option<(FeedKey, u32)> {
        if self.current.is_loading() || !self.current.has_more() {
            return None;
        }
        let page = self.current.page + 1;
        self.current.loading = Some(page);
        Some((self.current.key.clone(), page))
    }

    /// Apply a fetched page. Pages for another filter, or not the one
    /// requested, are ignored.
    pub fn apply_page(&mut self, key: &FeedKey, page: PostPage) -> bool {
        if *key != self.current.key || self.current.loading != Some(page.page) {
            debug!(filter = %key, page = page.page, "Ignoring stale feed page");
            return false;
        }
        self.current.loading = None;
        if page.page <= 1 {
            self.current.posts.clear();
            self.current.live.clear();
        }
        for post in page.posts {
            if !self.current.posts.iter().any(|p| p.id == post.id) {
                self.current.posts.push(post);
            }
        }
        self.current.page = page.page;
        self.current.total_pages = page.total_pages;
        true
    }

    pub fn fetch_failed(&mut self, key: &FeedKey, page: u32) {
        if *key == self.current.key && self.current.loading == Some(page) {
            self.current.loading = None;
        }
    }

    pub fn save_scroll(&mut self, offset: f64) {
        self.current.scroll = offset.max(0.0);
    }

    // =========================================================================
    // Live events
    // =========================================================================

    /// Head-insert a newly created post if the displayed filter admits it.
    pub fn on_post_created(&mut self, post: PostSummary) -> bool {
        if !self.current.key.admits_live(&post) {
            return false;
        }
        if self.current.posts.iter().any(|p| p.id == post.id) {
            metrics::record_duplicate("post_created");
            return false;
        }
        self.current.live.insert(post.id);
        self.current.posts.insert(0, post);
        true
    }

    pub fn on_post_updated(&mut self, post_id: i64, post: PostSummary) -> bool {
        match self.find_mut(post_id) {
            Some(existing) => {
                *existing = PostSummary { id: post_id, ..post };
                true
            }
            None => false,
        }
    }

    pub fn on_post_deleted(&mut self, post_id: i64) -> bool {
        let before = self.current.posts.len();
        self.current.posts.retain(|p| p.id != post_id);
        self.current.live.remove(&post_id);
        before != self.current.posts.len()
    }

    pub fn on_post_liked(&mut self, post_id: i64, like_count: u32) -> bool {
        self.find_mut(post_id)
            .map(|post| post.like_count = like_count)
            .is_some()
    }

    pub fn on_comment_count(&mut self, post_id: i64, count: u32) -> bool {
        self.find_mut(post_id)
            .map(|post| post.comment_count = count)
            .is_some()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = FeedView::empty(FeedKey::all());
    }

    fn find_mut(&mut self, post_id: i64) -> Option<&mut PostSummary> {
        self.current.posts.iter_mut().find(|p| p.id == post_id)
    }

    /// Save the displayed list under its key.
    ///
    /// Over the cap, the tail is cut and `page` drops to the last page whose
    /// fetched posts are all still held, so the next `load_more` resumes
    /// right after them. Live head inserts do not count toward that.
    fn snapshot_current(&mut self, now: Instant) {
        if self.current.page == 0 {
            return;
        }
        let mut posts = self.current.posts.clone();
        let mut live = self.current.live.clone();
        let mut page = self.current.page;
        if posts.len() > self.max_posts {
            posts.truncate(self.max_posts);
            live.retain(|id| posts.iter().any(|p| p.id == *id));
            let fetched = (posts.len() - live.len()) as u32;
            page = page.min(fetched / self.page_size);
            if page == 0 {
                debug!(filter = %self.current.key, "Nothing page-aligned to keep, not caching");
                self.snapshots.remove(&self.current.key);
                return;
            }
        }
        self.snapshots.insert(
            self.current.key.clone(),
            FeedSnapshot {
                posts,
                page,
                total_pages: self.current.total_pages,
                scroll: self.current.scroll,
                written_at: now,
                live,
            },
        );
    }

    /// Drop every expired snapshot.
    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.snapshots.len();
        self.snapshots
            .retain(|_, s| now.saturating_duration_since(s.written_at) < ttl);
        let dropped = before - self.snapshots.len();
        if dropped > 0 {
            trace!(dropped, "Expired feed snapshots pruned");
        }
    }
}
