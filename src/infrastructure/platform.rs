//! Platform services: audio cues, native banners, notification permission.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::shared::error::AppError;

/// Native notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

/// One tone of an audio cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: u32,
}

/// A short audio cue made of consecutive tones.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioCue {
    pub tones: Vec<Tone>,
    pub volume: f32,
}

impl AudioCue {
    /// The two-tone "new notification" chime.
    pub fn chime() -> Self {
        Self {
            tones: vec![
                Tone {
                    frequency_hz: 880.0,
                    duration_ms: 120,
                },
                Tone {
                    frequency_hz: 1320.0,
                    duration_ms: 160,
                },
            ],
            volume: 0.2,
        }
    }
}

/// A native notification banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub title: String,
    /// Plain text body (markup already stripped)
    pub body: String,
    /// Notification id, lets the platform collapse repeats
    pub tag: Option<String>,
    /// In-app route opened on interaction
    pub link: Option<String>,
}

/// Platform side effects of the notification hub.
pub trait Platform: Send + Sync {
    /// Play a cue. Fails when autoplay or focus policy blocks audio.
    fn play_cue(&self, cue: &AudioCue) -> Result<(), AppError>;

    fn permission(&self) -> NotificationPermission;

    fn show_banner(&self, banner: &Banner);
}

/// Platform for processes without a UI. Records side effects as log lines.
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    permission: NotificationPermission,
}

impl HeadlessPlatform {
    pub fn new(permission: NotificationPermission) -> Self {
        Self { permission }
    }
}

impl Platform for HeadlessPlatform {
    fn play_cue(&self, cue: &AudioCue) -> Result<(), AppError> {
        debug!(tones = cue.tones.len(), "Audio cue");
        Ok(())
    }

    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show_banner(&self, banner: &Banner) {
        info!(title = %banner.title, body = %banner.body, link = ?banner.link, "Notification banner");
    }
}
