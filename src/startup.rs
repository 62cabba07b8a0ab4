//! Application Startup
//!
//! Wires the collaborators together and manages the login/logout lifecycle
//! of the single session.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::services::{ConnectionError, ConnectionManager};
use crate::application::session::SessionRuntime;
use crate::config::Settings;
use crate::domain::entities::{ConnectionStatus, Credential, Identity};
use crate::infrastructure::cache::{BlobCache, ScrollMemory};
use crate::infrastructure::channel::{EventKind, Transport, WsTransport};
use crate::infrastructure::http::{ApiClient, CredentialProvider, HttpApiClient};
use crate::infrastructure::platform::{HeadlessPlatform, NotificationPermission, Platform};
use crate::presentation::SessionHandle;
use crate::shared::error::AppError;

struct ActiveSession {
    identity: Identity,
    handle: SessionHandle,
    runtime: JoinHandle<()>,
}

/// Application instance
pub struct Application {
    settings: Settings,
    api: Arc<dyn ApiClient>,
    platform: Arc<dyn Platform>,
    manager: ConnectionManager,
    blobs: Arc<BlobCache>,
    scroll: Arc<ScrollMemory>,
    session: Option<ActiveSession>,
}

impl Application {
    /// Build the application against the configured API and live channel.
    pub fn build(settings: Settings, credential: Credential) -> Result<Self, AppError> {
        let client = Arc::new(HttpApiClient::new(&settings.api, credential)?);
        tracing::info!(base_url = %settings.api.base_url, "HTTP client created");

        let transport = Arc::new(WsTransport::new(settings.connection.url.clone()));
        let platform = Arc::new(HeadlessPlatform::new(NotificationPermission::Default));

        Ok(Self::with_components(
            settings,
            transport,
            client.clone(),
            client,
            platform,
        ))
    }

    /// Build from explicit collaborators.
    pub fn with_components(
        settings: Settings,
        transport: Arc<dyn Transport>,
        api: Arc<dyn ApiClient>,
        credentials: Arc<dyn CredentialProvider>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let manager = ConnectionManager::new(transport, credentials, &settings.connection);
        Self {
            settings,
            api,
            platform,
            manager,
            blobs: Arc::new(BlobCache::new()),
            scroll: Arc::new(ScrollMemory::new()),
            session: None,
        }
    }

    /// Start the session for `identity`.
    ///
    /// Logging in again as the current identity returns the running session.
    /// Any other identity first tears the current session down completely.
    pub async fn login(&mut self, identity: Identity) -> Result<SessionHandle, ConnectionError> {
        if let Some(active) = &self.session {
            if active.identity.user_id == identity.user_id && !active.runtime.is_finished() {
                return Ok(active.handle.clone());
            }
            self.logout().await;
        }

        let (channel, events) = self.manager.open(identity.clone(), &EventKind::ALL).await?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (runtime, view) = SessionRuntime::new(
            identity.clone(),
            &channel,
            events,
            self.manager.monitor(),
            self.api.clone(),
            self.platform.clone(),
            &self.settings,
            commands_rx,
        );
        let runtime = tokio::spawn(runtime.run());
        let handle = SessionHandle::new(
            commands_tx,
            view,
            self.api.clone(),
            self.blobs.clone(),
            self.scroll.clone(),
        );

        info!(user_id = identity.user_id, username = %identity.username, "Session started");
        self.session = Some(ActiveSession {
            identity,
            handle: handle.clone(),
            runtime,
        });
        Ok(handle)
    }

    /// End the session: stop the runtime, then close the live channel.
    pub async fn logout(&mut self) {
        let Some(active) = self.session.take() else {
            return;
        };
        active.handle.shutdown();
        if let Err(e) = active.runtime.await {
            warn!(error = %e, "Session runtime ended abnormally");
        }
        self.manager.close().await;
        self.scroll.clear();
        info!(user_id = active.identity.user_id, "Session ended");
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.session.as_ref().map(|s| s.handle.clone())
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_status()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
