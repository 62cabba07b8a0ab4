//! Notification Hub
//!
//! One inbox fed by three origins:
//! - live records from the channel, inserted at the head unless the id is known
//! - admin broadcasts, keyed by the per-recipient id when the server sends one
//! - out-of-band pushes, which only raise a banner and never touch the inbox
//!
//! New items from the first two origins trigger the arrival side effects:
//! a best-effort audio cue, a short visual pulse and, with permission, a
//! native banner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::NotificationSettings;
use crate::domain::entities::{BroadcastRecord, Notification, PushPayload};
use crate::infrastructure::metrics;
use crate::infrastructure::platform::{AudioCue, Banner, NotificationPermission, Platform};
use crate::shared::markup::strip_markup;

/// Route opened when a push carries no link of its own.
pub const DEFAULT_PUSH_ROUTE: &str = "/notifications";

pub struct NotificationHub {
    user_id: i64,
    items: Vec<Notification>,
    limit: usize,
    pulse: Duration,
    pulse_until: Option<Instant>,
    platform: Arc<dyn Platform>,
    refreshes: u64,
    refresh_applied: u64,
    /// Ids that arrived live, with the last refresh issued before them.
    arrivals: HashMap<String, u64>,
}

impl NotificationHub {
    pub fn new(user_id: i64, platform: Arc<dyn Platform>, settings: &NotificationSettings) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            limit: settings.live_limit,
            pulse: settings.pulse(),
            pulse_until: None,
            platform,
            refreshes: 0,
            refresh_applied: 0,
            arrivals: HashMap::new(),
        }
    }

    /// Newest first.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    /// Tag an inbox fetch about to be issued.
    pub fn begin_refresh(&mut self) -> u64 {
        self.refreshes += 1;
        self.refreshes
    }

    /// Merge the server's list fetched under `request`.
    ///
    /// The server list is authoritative for what it contains, except that a
    /// local read mark is never undone. Live records that arrived after the
    /// request went out stay at the head even though the server has not
    /// listed them.
    /// Responses older than one already applied are dropped.
    pub fn apply_refresh(&mut self, request: u64, notifications: Vec<Notification>) -> bool {
        if request < self.refresh_applied {
            debug!(request, applied = self.refresh_applied, "Dropping stale inbox refresh");
            return false;
        }
        self.refresh_applied = request;

        let locally_read: Vec<String> = self
            .items
            .iter()
            .filter(|n| n.read)
            .map(|n| n.id.clone())
            .collect();
        let mut items: Vec<Notification> = self
            .items
            .drain(..)
            .filter(|n| {
                self.arrivals.get(&n.id).is_some_and(|issued| *issued >= request)
                    && !notifications.iter().any(|server| server.id == n.id)
            })
            .collect();
        for mut notification in notifications {
            if items.iter().any(|n| n.id == notification.id) {
                continue;
            }
            if locally_read.contains(&notification.id) {
                notification.read = true;
            }
            items.push(notification);
        }
        items.truncate(self.limit);

        self.arrivals
            .retain(|id, issued| *issued >= request && items.iter().any(|n| &n.id == id));
        self.items = items;
        true
    }

    /// A persisted record from the live channel. Returns whether it was new.
    pub fn on_live(&mut self, notification: Notification, now: Instant) -> bool {
        if self.contains(&notification.id) {
            trace!(id = %notification.id, "Duplicate notification dropped");
            metrics::record_duplicate("notification");
            return false;
        }
        self.announce(&notification, now);
        self.arrivals.insert(notification.id.clone(), self.refreshes);
        self.items.insert(0, notification);
        self.items.truncate(self.limit);
        true
    }

    /// An admin broadcast.
    ///
    /// Without a per-recipient id the entry gets a synthetic id valid for this
    /// process only, so a later full refresh may show it twice.
    pub fn on_broadcast(&mut self, record: BroadcastRecord, now: Instant) -> bool {
        let id = match record.id_for(self.user_id) {
            Some(id) => id.to_string(),
            None => format!("local-{}", Uuid::new_v4()),
        };
        self.on_live(record.into_notification(id), now)
    }

    /// An out-of-band push. Only a banner is raised, and only with permission.
    pub fn on_push(&self, payload: &PushPayload) -> Option<Banner> {
        if self.platform.permission() != NotificationPermission::Granted {
            debug!("Push banner suppressed, permission not granted");
            return None;
        }
        let banner = Banner {
            title: payload.title.clone(),
            body: strip_markup(&payload.body),
            tag: payload.notification_id.clone(),
            link: Some(Self::push_route(payload)),
        };
        self.platform.show_banner(&banner);
        Some(banner)
    }

    /// Route to open when the user interacts with a push banner.
    pub fn push_route(payload: &PushPayload) -> String {
        payload
            .link
            .clone()
            .filter(|link| link.starts_with('/'))
            .unwrap_or_else(|| DEFAULT_PUSH_ROUTE.to_string())
    }

    /// Mark one read locally. Never rolled back.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(notification) if !notification.read => {
                notification.read = true;
                true
            }
            _ => false,
        }
    }

    /// Mark everything read locally. Returns how many entries changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.items.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    /// Another device marked the inbox read.
    pub fn on_marked_read_elsewhere(&mut self) {
        self.mark_all_read();
    }

    pub fn pulse_active(&self, now: Instant) -> bool {
        self.pulse_until.is_some_and(|until| now < until)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pulse_until
    }

    /// End the pulse once it has run. Returns whether anything changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        match self.pulse_until {
            Some(until) if now >= until => {
                self.pulse_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.arrivals.clear();
        self.pulse_until = None;
    }

    fn announce(&mut self, notification: &Notification, now: Instant) {
        if let Err(e) = self.platform.play_cue(&AudioCue::chime()) {
            debug!(error = %e, "Audio cue skipped");
        }
        self.pulse_until = Some(now + self.pulse);
        if self.platform.permission() == NotificationPermission::Granted {
            self.platform.show_banner(&Banner {
                title: notification.title.clone(),
                body: strip_markup(&notification.content),
                tag: Some(notification.id.clone()),
                link: Some(notification.route()),
            });
        }
    }
}
