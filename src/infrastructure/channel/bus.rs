//! Typed event fan-out.
//!
//! Components never register raw callbacks on the channel. They hold a
//! [`Subscription`] for the event kinds they handle; dropping it detaches the
//! listener, and closing the bus detaches all of them at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use super::events::{EventKind, InboundEvent};
use crate::infrastructure::metrics;

struct Listener {
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

/// Per-session event bus owned by the connection manager.
pub struct EventBus {
    listeners: DashMap<u64, Listener>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Attach a listener for `kinds`.
    ///
    /// Subscribing to a closed bus yields a subscription that is already ended.
    pub fn subscribe(self: &Arc<Self>, kinds: &[EventKind]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_closed() {
            self.listeners.insert(
                id,
                Listener {
                    kinds: kinds.to_vec(),
                    tx,
                },
            );
        }
        Subscription {
            id,
            rx,
            bus: Arc::downgrade(self),
        }
    }

    /// Deliver `event` to every listener of its kind. Returns the number of
    /// listeners reached.
    pub fn publish(&self, event: InboundEvent) -> usize {
        if self.is_closed() {
            return 0;
        }
        metrics::record_event(event.name());

        let kind = event.kind();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.listeners.iter() {
            if !entry.kinds.contains(&kind) {
                continue;
            }
            if entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.listeners.remove(&id);
        }
        trace!(event = event.name(), delivered, "Published channel event");
        delivered
    }

    /// Detach every listener. Pending events already queued stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.remove(&id);
    }
}

/// Receiving end of a bus listener. Detaches on drop.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<InboundEvent>,
    bus: Weak<EventBus>,
}

impl Subscription {
    /// Next event, or `None` once the bus is closed and drained.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
