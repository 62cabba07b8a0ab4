//! HTTP collaborator: the REST endpoints the session layer calls and the
//! credentials it authenticates with.

mod api;
mod client;
mod credentials;

#[cfg(test)]
pub use api::MockApiClient;
pub use api::{ApiClient, WebPushKeys, WebPushSubscription};
pub use client::HttpApiClient;
pub use credentials::{CredentialProvider, StaticCredentials};
