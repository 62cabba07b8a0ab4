//! Application Error Types
//!
//! Centralized error taxonomy for the session layer.
//!
//! Network and authentication failures are absorbed by the connection manager;
//! room and notification failures are surfaced to the affected view only.
//! Duplicate deliveries and stale cache entries are not errors at all: they are
//! resolved silently by the component that sees them.

use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a non-success HTTP status to the matching error class.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => AppError::AuthRejected(message),
            403 => AppError::AccessDenied(message),
            404 => AppError::NotFound(message),
            408 | 429 | 500..=599 => AppError::TransientNetwork(message),
            _ => AppError::Unexpected { status, message },
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransientNetwork(_) => true,
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Short machine-readable code used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TransientNetwork(_) => "transient_network",
            AppError::AuthRejected(_) => "auth_rejected",
            AppError::AccessDenied(_) => "access_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Platform(_) => "platform",
            AppError::Unexpected { .. } => "unexpected_status",
            AppError::Http(_) => "http",
            AppError::Serialization(_) => "serialization",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Error body returned by the HTTP collaborator
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
