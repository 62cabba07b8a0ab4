//! Feed post entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a post as shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: i64,
    #[serde(default)]
    pub category: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub author_id: i64,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// One page of the posts endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_pages: u32,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Exact (category, search term) filter a feed list is keyed by.
///
/// Blank values are normalized to `None` so "" and absent compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FeedKey {
    category: Option<String>,
    search: Option<String>,
}

impl FeedKey {
    pub fn new(category: Option<&str>, search: Option<&str>) -> Self {
        fn normalize(value: Option<&str>) -> Option<String> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            category: normalize(category),
            search: normalize(search),
        }
    }

    /// The unfiltered feed.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Whether a live-created post belongs in a list with this filter.
    ///
    /// Search results are never extended live; category lists accept only
    /// posts of their own category.
    pub fn admits_live(&self, post: &PostSummary) -> bool {
        if self.search.is_some() {
            return false;
        }
        match &self.category {
            None => true,
            Some(category) => post.category.as_deref() == Some(category.as_str()),
        }
    }
}

impl std::fmt::Display for FeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "category={} search={}",
            self.category.as_deref().unwrap_or("*"),
            self.search.as_deref().unwrap_or("")
        )
    }
}
