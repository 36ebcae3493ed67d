//! Adaptive-streaming engine contract

use super::{MediaElement, SubscriptionId, TextTrackKind};
use crate::config::{PlayerConfig, QualityPreference};
use crate::error::ConstructionError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Engine error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The engine keeps going (retries, switches variant)
    Recoverable,
    /// Playback cannot continue without a reload
    Critical,
}

/// Error raised by the streaming engine.
///
/// Codes are grouped by thousands: 1xxx network, 2xxx text, 3xxx media,
/// 4xxx manifest, 5xxx streaming, 6xxx DRM, 7xxx player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("streaming engine error {code}: {message}")]
pub struct EngineError {
    pub code: u32,
    pub severity: Severity,
    pub message: String,
}

impl EngineError {
    pub fn new(code: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
        }
    }
}

/// Engine rendition combining a video and an audio choice
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTrack {
    pub id: u64,
    pub active: bool,
    /// Bits per second
    pub bandwidth: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub language: String,
    pub label: Option<String>,
    pub channels: Option<u8>,
}

/// Text track known to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTextTrack {
    pub id: u64,
    pub active: bool,
    pub language: String,
    pub label: Option<String>,
    pub kind: TextTrackKind,
    pub mime_type: Option<String>,
}

/// Retry policy for segment requests; interpreted by the engine only
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryParameters {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

/// Settings pushed to the engine at initialization
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub abr_enabled: bool,
    /// Seconds of media to keep buffered ahead
    pub buffering_goal: f64,
    pub retry: RetryParameters,
    pub low_latency: bool,
}

impl From<&PlayerConfig> for EngineConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            abr_enabled: config.preferred_quality == QualityPreference::Auto,
            buffering_goal: config.buffer_size,
            retry: RetryParameters {
                max_attempts: config.retry_attempts,
                base_delay: config.retry_delay(),
            },
            low_latency: config.low_latency,
        }
    }
}

/// Signals emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// ABR switched variant on its own
    Adaptation,
    /// A variant was selected explicitly
    VariantChanged,
    TextChanged,
    /// The set of available tracks changed
    TracksChanged,
    Buffering(bool),
    Error(EngineError),
}

/// Listener for engine signals
pub type EngineListener = Arc<dyn Fn(&EngineSignal) + Send + Sync>;

/// Adaptive-streaming engine bound to one media element
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    /// Whether the environment can run this engine at all
    fn is_supported(&self) -> bool;

    async fn attach(&self, element: Arc<dyn MediaElement>) -> Result<(), EngineError>;

    fn configure(&self, config: &EngineConfig);

    async fn load(&self, url: &str) -> Result<(), EngineError>;

    async fn destroy(&self);

    fn is_live(&self) -> bool;

    fn variant_tracks(&self) -> Vec<VariantTrack>;

    fn text_tracks(&self) -> Vec<EngineTextTrack>;

    fn select_variant(&self, id: u64, clear_buffer: bool);

    fn select_audio_language(&self, language: &str);

    fn select_text_track(&self, id: u64);

    fn set_text_visibility(&self, visible: bool);

    fn is_text_visible(&self) -> bool;

    fn abr_enabled(&self) -> bool;

    fn set_abr_enabled(&self, enabled: bool);

    fn subscribe(&self, listener: EngineListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Loads the engine library.
///
/// Loading can fail when the library is missing from the host build; the
/// factory treats that as a signal to fall back to the native adapter.
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn StreamingEngine>, ConstructionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_from_player_config() {
        let config = PlayerConfig {
            preferred_quality: QualityPreference::Height(720),
            retry_attempts: 5,
            retry_delay_ms: 250,
            ..Default::default()
        };
        let engine = EngineConfig::from(&config);
        assert!(!engine.abr_enabled);
        assert_eq!(engine.buffering_goal, 30.0);
        assert_eq!(engine.retry.max_attempts, 5);
        assert_eq!(engine.retry.base_delay, Duration::from_millis(250));

        let auto = EngineConfig::from(&PlayerConfig::default());
        assert!(auto.abr_enabled);
    }
}
