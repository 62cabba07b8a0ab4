//! Live channel plumbing.
//!
//! - **events**: Inbound event and outbound command formats
//! - **bus**: Typed per-session fan-out with drop-to-unsubscribe
//! - **outbox**: Cloneable command sender
//! - **transport**: Transport trait and link type
//! - **websocket**: `tokio-tungstenite` transport

mod bus;
mod events;
mod outbox;
mod transport;
mod websocket;

pub use bus::{EventBus, Subscription};
pub use events::{EventKind, InboundEvent, OutboundCommand};
pub use outbox::ChannelSender;
pub use transport::{ChannelError, Transport, TransportLink};
pub use websocket::WsTransport;
