//! # Community Session Library
//!
//! Real-time session layer of a membership-community client:
//! - One live channel per logged-in identity, with backoff reconnection
//! - Presence, chat rooms with moderation, notifications and feed sync
//! - REST collaborators over `reqwest`, live channel over `tokio-tungstenite`
//!
//! ## Architecture
//!
//! - **Domain Layer**: Entities and pure policies (reconciliation, backoff, moderation)
//! - **Application Layer**: Session components, the session runtime and view DTOs
//! - **Infrastructure Layer**: Channel transport, HTTP client, caches, metrics, platform
//! - **Presentation Layer**: The session handle UI code drives
//!
//! ## Module Structure
//!
//! ```text
//! community_session/
//! +-- config/         Configuration management
//! +-- domain/         Entities and domain services
//! +-- application/    Session components, runtime and DTOs
//! +-- infrastructure/ Channel, HTTP, caches, metrics, platform
//! +-- presentation/   Session handle
//! +-- shared/         Common utilities (errors, markup, timers)
//! ```

// Configuration module
pub mod config;

// Domain layer - Entities and policies
pub mod domain;

// Application layer - Session components
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - Session handle
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and session lifecycle
pub mod startup;

// Telemetry and observability
pub mod telemetry;
