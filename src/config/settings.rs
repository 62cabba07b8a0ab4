//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// HTTP collaborator configuration
    pub api: ApiSettings,

    /// Live channel and reconnection policy
    pub connection: ConnectionSettings,

    /// Chat room timings
    pub rooms: RoomSettings,

    /// Notification inbox configuration
    pub notifications: NotificationSettings,

    /// Feed cache configuration
    pub feed: FeedSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the REST API (e.g., "https://community.example.com")
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Live channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// WebSocket endpoint of the live channel
    pub url: String,

    /// Delay before the first reconnection attempt, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound of the exponential backoff, in milliseconds
    pub max_delay_ms: u64,

    /// Multiplicative jitter factor in [0, 1]
    pub jitter: f64,

    /// How long a connection problem must last before the UI indicator shows
    pub indicator_debounce_ms: u64,

    /// Retry budget for transient failures (None = retry forever)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Chat room timings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomSettings {
    /// How long the eviction reason stays visible before the room view closes
    pub eviction_notice_ms: u64,

    /// How long inline room errors stay visible
    pub error_dismiss_ms: u64,
}

/// Notification inbox configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Size of the live-maintained inbox slice
    pub live_limit: usize,

    /// Visual pulse duration in milliseconds (at most 700)
    pub pulse_ms: u64,
}

/// Feed cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// Snapshot time-to-live in seconds
    pub ttl_secs: u64,

    /// Posts retained per snapshot
    pub max_posts: usize,

    /// Page size requested from the posts endpoint
    pub page_size: u32,
}

/// Longest visual pulse the notification hub may run.
pub const MAX_PULSE_MS: u64 = 700;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the reconnection or pulse settings are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("api.base_url", "http://localhost:3000")?
            .set_default("api.timeout_secs", 15_i64)?
            .set_default("connection.url", "ws://localhost:3000/ws")?
            .set_default("connection.base_delay_ms", 1000_i64)?
            .set_default("connection.max_delay_ms", 10000_i64)?
            .set_default("connection.jitter", 0.5)?
            .set_default("connection.indicator_debounce_ms", 2000_i64)?
            .set_default("rooms.eviction_notice_ms", 2000_i64)?
            .set_default("rooms.error_dismiss_ms", 4000_i64)?
            .set_default("notifications.live_limit", 20_i64)?
            .set_default("notifications.pulse_ms", 700_i64)?
            .set_default("feed.ttl_secs", 600_i64)?
            .set_default("feed.max_posts", 60_i64)?
            .set_default("feed.page_size", 20_i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__CONNECTION__URL=wss://... -> connection.url
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.base_url", std::env::var("API_BASE_URL").ok())?
            .set_override_option("connection.url", std::env::var("CHANNEL_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Check cross-field constraints the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.connection;
        if !(0.0..=1.0).contains(&c.jitter) {
            return Err(ConfigError::Message(format!(
                "connection.jitter must be within [0, 1], got {}",
                c.jitter
            )));
        }
        if c.base_delay_ms == 0 || c.base_delay_ms > c.max_delay_ms {
            return Err(ConfigError::Message(format!(
                "connection.base_delay_ms ({}) must be positive and not exceed max_delay_ms ({})",
                c.base_delay_ms, c.max_delay_ms
            )));
        }
        if self.notifications.pulse_ms > MAX_PULSE_MS {
            return Err(ConfigError::Message(format!(
                "notifications.pulse_ms must not exceed {}ms, got {}",
                MAX_PULSE_MS, self.notifications.pulse_ms
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            connection: ConnectionSettings::default(),
            rooms: RoomSettings::default(),
            notifications: NotificationSettings::default(),
            feed: FeedSettings::default(),
            environment: "development".into(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout_secs: 15,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".into(),
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: 0.5,
            indicator_debounce_ms: 2000,
            max_attempts: None,
        }
    }
}

impl ConnectionSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn indicator_debounce(&self) -> Duration {
        Duration::from_millis(self.indicator_debounce_ms)
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            eviction_notice_ms: 2000,
            error_dismiss_ms: 4000,
        }
    }
}

impl RoomSettings {
    pub fn eviction_notice(&self) -> Duration {
        Duration::from_millis(self.eviction_notice_ms)
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            live_limit: 20,
            pulse_ms: MAX_PULSE_MS,
        }
    }
}

impl NotificationSettings {
    /// Pulse duration, clamped to the 700ms ceiling.
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms.min(MAX_PULSE_MS))
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_posts: 60,
            page_size: 20,
        }
    }
}

impl FeedSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
