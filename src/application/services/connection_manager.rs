//! Connection Manager
//!
//! Owns the single live channel of the logged-in identity: opens it, drives
//! reconnection with backoff, refreshes a rejected credential once, and tears
//! everything down on logout before another identity may connect.
//!
//! Lifecycle events are synthesized here and published on the session bus
//! like any wire event. The status state machine is updated before listeners
//! see the event.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConnectionSettings;
use crate::domain::entities::{ConnectionState, ConnectionStatus, Identity};
use crate::domain::services::BackoffPolicy;
use crate::infrastructure::channel::{
    ChannelError, ChannelSender, EventBus, EventKind, InboundEvent, OutboundCommand,
    Subscription, Transport, TransportLink,
};
use crate::infrastructure::http::CredentialProvider;
use crate::infrastructure::metrics;

/// Connection manager errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("A channel is already open for user {current}; close it before opening one for {requested}")]
    IdentityBusy { current: i64, requested: i64 },
}

/// Handle to an open channel given to session components.
///
/// Components may subscribe and emit; only the manager opens or closes.
#[derive(Clone)]
pub struct SessionChannel {
    bus: Arc<EventBus>,
    sender: ChannelSender,
}

impl SessionChannel {
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        self.bus.subscribe(kinds)
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.bus.is_closed()
    }
}

/// Read-only view of the connection state for the UI side.
#[derive(Clone)]
pub struct ConnectionMonitor {
    state: Arc<Mutex<ConnectionState>>,
    debounce: Duration,
}

impl ConnectionMonitor {
    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status()
    }

    pub fn attempt(&self) -> u32 {
        self.state.lock().attempt()
    }

    /// Whether the connection-problem indicator should be shown.
    pub fn indicator_visible(&self, now: Instant) -> bool {
        self.state.lock().indicator_visible(now, self.debounce)
    }

    pub fn indicator_deadline(&self, now: Instant) -> Option<Instant> {
        self.state.lock().indicator_deadline(now, self.debounce)
    }
}

struct ActiveChannel {
    identity: Identity,
    channel: SessionChannel,
    shutdown: oneshot::Sender<()>,
    driver: JoinHandle<()>,
}

/// Owner of the live channel.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    policy: BackoffPolicy,
    max_attempts: Option<u32>,
    state: Arc<Mutex<ConnectionState>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    debounce: Duration,
    active: Option<ActiveChannel>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        settings: &ConnectionSettings,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            transport,
            credentials,
            policy: BackoffPolicy::from_settings(settings),
            max_attempts: settings.max_attempts,
            state: Arc::new(Mutex::new(ConnectionState::new())),
            status_tx: Arc::new(status_tx),
            debounce: settings.indicator_debounce(),
            active: None,
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Open the channel for `identity` and subscribe to `kinds`.
    ///
    /// The subscription is attached before the driver starts, so the first
    /// `connect` event is never missed. Opening again for the same identity
    /// reuses the running channel; a different identity is refused until
    /// [`close`](Self::close) has completed.
    pub async fn open(
        &mut self,
        identity: Identity,
        kinds: &[EventKind],
    ) -> Result<(SessionChannel, Subscription), ConnectionError> {
        if let Some(active) = &self.active {
            if active.identity.user_id != identity.user_id {
                return Err(ConnectionError::IdentityBusy {
                    current: active.identity.user_id,
                    requested: identity.user_id,
                });
            }
            if !active.driver.is_finished() {
                let channel = active.channel.clone();
                let subscription = channel.subscribe(kinds);
                return Ok((channel, subscription));
            }
            debug!(user_id = identity.user_id, "Previous driver finished, reopening");
            self.close().await;
        }

        let bus = EventBus::new();
        let subscription = bus.subscribe(kinds);
        let (sender, outbox) = ChannelSender::new();
        let channel = SessionChannel { bus, sender };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.state.lock().begin();
        self.publish_status();

        let driver = Driver {
            identity: identity.clone(),
            transport: self.transport.clone(),
            credentials: self.credentials.clone(),
            policy: self.policy,
            max_attempts: self.max_attempts,
            state: self.state.clone(),
            status_tx: self.status_tx.clone(),
            bus: channel.bus.clone(),
            outbox,
            shutdown: shutdown_rx,
        };
        let driver = tokio::spawn(driver.run());

        info!(user_id = identity.user_id, "Opening live channel");
        self.active = Some(ActiveChannel {
            identity,
            channel: channel.clone(),
            shutdown: shutdown_tx,
            driver,
        });
        Ok((channel, subscription))
    }

    /// Tear the channel down: stop the driver (cancelling any pending retry
    /// timer), detach every listener and return to idle.
    ///
    /// Completes only after the driver task has exited.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.shutdown.send(());
        if let Err(e) = active.driver.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Connection driver ended abnormally");
            }
        }
        active.channel.bus.close();
        self.state.lock().reset();
        self.publish_status();
        info!(user_id = active.identity.user_id, "Live channel closed");
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.active.as_ref().map(|a| &a.identity)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status()
    }

    pub fn attempt(&self) -> u32 {
        self.state.lock().attempt()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor {
            state: self.state.clone(),
            debounce: self.debounce,
        }
    }

    fn publish_status(&self) {
        let status = self.state.lock().status();
        self.status_tx.send_replace(status);
        metrics::set_connection_status(status);
    }
}

enum PumpExit {
    Shutdown,
    Dropped(String),
}

/// Background task serving one identity's channel.
struct Driver {
    identity: Identity,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    policy: BackoffPolicy,
    max_attempts: Option<u32>,
    state: Arc<Mutex<ConnectionState>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    bus: Arc<EventBus>,
    outbox: mpsc::UnboundedReceiver<OutboundCommand>,
    shutdown: oneshot::Receiver<()>,
}

impl Driver {
    async fn run(mut self) {
        let user_id = self.identity.user_id;
        let mut attempt: u32 = 0;
        let mut refreshed = false;
        let mut resumed = false;

        loop {
            let credential = self.credentials.current();
            let dial = tokio::select! {
                _ = &mut self.shutdown => return,
                result = self.transport.connect(&self.identity, &credential) => result,
            };

            match dial {
                Ok(link) => {
                    attempt = 0;
                    refreshed = false;
                    if resumed {
                        self.emit(InboundEvent::Reconnect);
                    }
                    self.emit(InboundEvent::Connect);
                    resumed = true;
                    info!(user_id, "Live channel established");

                    match self.pump(link).await {
                        PumpExit::Shutdown => return,
                        PumpExit::Dropped(reason) => {
                            warn!(user_id, %reason, "Live channel dropped");
                            self.emit(InboundEvent::Disconnect { reason });
                        }
                    }
                }
                Err(ChannelError::AuthRejected(reason)) => {
                    self.emit(InboundEvent::ConnectError {
                        reason: reason.clone(),
                    });
                    if refreshed {
                        warn!(user_id, %reason, "Credential rejected after refresh, giving up");
                        self.emit(InboundEvent::ReconnectFailed);
                        return;
                    }
                    refreshed = true;
                    metrics::record_reconnect_attempt("auth_refresh");
                    let refresh = tokio::select! {
                        _ = &mut self.shutdown => return,
                        result = self.credentials.refresh() => result,
                    };
                    match refresh {
                        Ok(_) => {
                            debug!(user_id, "Credential refreshed, retrying");
                            continue;
                        }
                        Err(e) if e.is_transient() => {
                            debug!(user_id, error = %e, "Credential refresh failed transiently");
                        }
                        Err(e) => {
                            warn!(user_id, error = %e, "Credential refresh refused");
                            self.emit(InboundEvent::ReconnectFailed);
                            return;
                        }
                    }
                }
                Err(e) => {
                    debug!(user_id, error = %e, "Live channel connect failed");
                    self.emit(InboundEvent::ConnectError {
                        reason: e.to_string(),
                    });
                }
            }

            attempt += 1;
            if let Some(max) = self.max_attempts {
                if attempt > max {
                    warn!(user_id, attempts = max, "Retry budget exhausted");
                    self.emit(InboundEvent::ReconnectFailed);
                    return;
                }
            }
            let delay = self.policy.next_delay(attempt, &mut rand::rng());
            debug!(user_id, attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            tokio::select! {
                _ = &mut self.shutdown => return,
                _ = tokio::time::sleep(delay) => {}
            }
            metrics::record_reconnect_attempt("transient");
            self.emit(InboundEvent::ReconnectAttempt { attempt });
        }
    }

    /// Shuttle commands out and events in until the link goes away.
    async fn pump(&mut self, mut link: TransportLink) -> PumpExit {
        loop {
            tokio::select! {
                _ = &mut self.shutdown => return PumpExit::Shutdown,
                command = self.outbox.recv() => match command {
                    Some(command) => {
                        if link.outbound.send(command).is_err() {
                            return PumpExit::Dropped("writer closed".to_string());
                        }
                    }
                    None => return PumpExit::Shutdown,
                },
                event = link.inbound.recv() => match event {
                    Some(InboundEvent::Disconnect { reason }) => return PumpExit::Dropped(reason),
                    Some(event) => {
                        self.bus.publish(event);
                    }
                    None => return PumpExit::Dropped("transport closed".to_string()),
                },
            }
        }
    }

    fn emit(&self, event: InboundEvent) {
        if let Some(input) = event.lifecycle() {
            let status = {
                let mut state = self.state.lock();
                state.apply(&input, tokio::time::Instant::now().into_std());
                state.status()
            };
            self.status_tx.send_replace(status);
            metrics::set_connection_status(status);
        }
        self.bus.publish(event);
    }
}
