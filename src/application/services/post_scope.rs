//! Post detail scope: live comments for the open post.

use crate::domain::entities::Comment;
use crate::infrastructure::channel::{ChannelSender, OutboundCommand};
use crate::infrastructure::metrics;

pub struct PostScope {
    outbox: ChannelSender,
    open: Option<i64>,
    comments: Vec<Comment>,
}

impl PostScope {
    pub fn new(outbox: ChannelSender) -> Self {
        Self {
            outbox,
            open: None,
            comments: Vec::new(),
        }
    }

    pub fn open_post(&self) -> Option<i64> {
        self.open
    }

    /// Live comments received since the post was opened, oldest first.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Start listening to a post, leaving the previous one.
    pub fn open(&mut self, post_id: i64) {
        if self.open == Some(post_id) {
            return;
        }
        self.close();
        self.open = Some(post_id);
        self.outbox.emit(OutboundCommand::JoinPostScope { post_id });
    }

    pub fn close(&mut self) {
        if let Some(post_id) = self.open.take() {
            self.outbox.emit(OutboundCommand::LeavePostScope { post_id });
        }
        self.comments.clear();
    }

    pub fn on_comment_created(&mut self, comment: Comment) -> bool {
        if self.open != Some(comment.post_id) {
            return false;
        }
        if self.comments.iter().any(|c| c.id == comment.id) {
            metrics::record_duplicate("comment");
            return false;
        }
        self.comments.push(comment);
        true
    }

    /// Re-enter the scope after a reconnect.
    pub fn on_connected(&self) {
        if let Some(post_id) = self.open {
            self.outbox.emit(OutboundCommand::JoinPostScope { post_id });
        }
    }
}
