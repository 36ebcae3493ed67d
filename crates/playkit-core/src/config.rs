//! Player configuration
//!
//! Every field has a documented default and the struct is `#[serde(default)]`,
//! so a partial JSON document merges over the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Preferred rendition at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    /// Let the engine choose (adaptive bitrate)
    #[default]
    Auto,
    /// Pin the rendition with this height
    Height(u32),
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial volume (0.0 - 1.0)
    pub volume: f64,
    /// Start muted
    pub muted: bool,
    /// Start playback once loaded
    pub auto_play: bool,
    /// Preferred quality at load time
    pub preferred_quality: QualityPreference,
    /// Preferred audio language (BCP-47)
    pub preferred_audio_language: Option<String>,
    /// Preferred subtitle language (BCP-47)
    pub preferred_subtitle_language: Option<String>,
    /// Buffer target in seconds
    pub buffer_size: f64,
    /// Retry attempts for failed segment requests
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Favor latency over stability for live streams
    pub low_latency: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            auto_play: false,
            preferred_quality: QualityPreference::Auto,
            preferred_audio_language: None,
            preferred_subtitle_language: None,
            buffer_size: 30.0,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            low_latency: false,
        }
    }
}

impl PlayerConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Create config optimized for low-latency live streaming
    pub fn low_latency() -> Self {
        Self {
            buffer_size: 6.0,
            retry_attempts: 5,
            retry_delay_ms: 500,
            low_latency: true,
            ..Default::default()
        }
    }

    /// Reject values no backend can honor
    pub fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() {
            return Err(Error::InvalidConfig("volume must be a finite number".into()));
        }
        if !(self.buffer_size.is_finite() && self.buffer_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "buffer_size must be positive, got {}",
                self.buffer_size
            )));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_config_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.volume, 1.0);
        assert!(!config.muted);
        assert!(!config.auto_play);
        assert_eq!(config.preferred_quality, QualityPreference::Auto);
        assert_eq!(config.buffer_size, 30.0);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_json_merges_over_defaults() {
        let config = PlayerConfig::from_json(
            r#"{ "volume": 0.4, "preferred_quality": { "height": 720 } }"#,
        )
        .unwrap();
        assert_eq!(config.volume, 0.4);
        assert_eq!(config.preferred_quality, QualityPreference::Height(720));
        assert_eq!(config.retry_attempts, 3);

        let auto = PlayerConfig::from_json(r#"{ "preferred_quality": "auto" }"#).unwrap();
        assert_eq!(auto.preferred_quality, QualityPreference::Auto);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PlayerConfig::from_json(r#"{ "buffer_size": -1 }"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(PlayerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_low_latency_preset() {
        let config = PlayerConfig::low_latency();
        assert!(config.low_latency);
        assert!(config.buffer_size < PlayerConfig::default().buffer_size);
    }
}
