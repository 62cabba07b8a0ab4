//! Transport seam between the connection manager and the network.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::events::{InboundEvent, OutboundCommand};
use crate::domain::entities::{Credential, Identity};

static AUTH_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(unauthori[sz]ed|\bjwt\b|token expired|invalid token|forbidden|\b401\b)")
        .expect("valid auth regex")
});

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Channel closed")]
    Closed,
}

impl ChannelError {
    /// Classify a free-form failure reason by its text signature.
    pub fn classify(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if AUTH_SIGNATURE.is_match(&reason) {
            ChannelError::AuthRejected(reason)
        } else {
            ChannelError::Transport(reason)
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ChannelError::AuthRejected(_))
    }
}

/// An established connection.
///
/// `inbound` yields wire events until the peer goes away; the final event is a
/// [`InboundEvent::Disconnect`] or the stream simply ends. Background tasks
/// serving the link are aborted when it is dropped.
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundCommand>,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundCommand>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            tasks: Vec::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks = tasks;
        self
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Opens live channel connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        identity: &Identity,
        credential: &Credential,
    ) -> Result<TransportLink, ChannelError>;
}
