//! Outbound command queue shared by the session components.

use tokio::sync::mpsc;
use tracing::debug;

use super::events::OutboundCommand;

/// Cloneable handle for emitting commands on the live channel.
///
/// Only the connection manager drains the queue; commands emitted while the
/// channel is down wait until the next connection.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<OutboundCommand>,
}

impl ChannelSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a command. Returns false once the session is torn down.
    pub fn emit(&self, command: OutboundCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(mpsc::error::SendError(command)) => {
                debug!(?command, "Dropped command for closed channel");
                false
            }
        }
    }
}
