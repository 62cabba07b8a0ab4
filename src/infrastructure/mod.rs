//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - The live channel (WebSocket transport, event bus, outbound queue)
//! - The HTTP collaborator (REST client, credentials)
//! - Process-lifetime caches
//! - Platform side effects (audio, banners)
//! - Prometheus metrics

pub mod cache;
pub mod channel;
pub mod http;
pub mod metrics;
pub mod platform;
