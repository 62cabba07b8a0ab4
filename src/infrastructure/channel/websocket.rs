//! WebSocket transport for the live channel.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use super::events::{InboundEvent, OutboundCommand};
use super::transport::{ChannelError, Transport, TransportLink};
use crate::domain::entities::{Credential, Identity};

/// Connects to the live channel endpoint with a bearer credential.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

fn map_connect_error(error: WsError) -> ChannelError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if status == 401 || status == 403 {
                ChannelError::AuthRejected(format!("handshake rejected with {status}"))
            } else {
                ChannelError::Transport(format!("handshake failed with {status}"))
            }
        }
        other => ChannelError::classify(other.to_string()),
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        identity: &Identity,
        credential: &Credential,
    ) -> Result<TransportLink, ChannelError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| ChannelError::AuthRejected("credential is not a valid header".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _response) = connect_async(request).await.map_err(map_connect_error)?;
        info!(user_id = identity.user_id, url = %self.url, "Live channel connected");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundCommand>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundEvent>();

        let writer = tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode outbound command");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(error = %e, "Live channel write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<InboundEvent>(&text) {
                            Ok(event) if event.is_wire() => {
                                if inbound_tx.send(event).is_err() {
                                    return;
                                }
                            }
                            Ok(event) => {
                                debug!(event = event.name(), "Ignoring lifecycle event from peer");
                            }
                            Err(e) => {
                                warn!(error = %e, "Invalid live channel frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "server closed".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "transport closed".to_string(),
                }
            };
            let _ = inbound_tx.send(InboundEvent::Disconnect { reason });
        });

        Ok(TransportLink::new(outbound_tx, inbound_rx).with_tasks(vec![writer, reader]))
    }
}
