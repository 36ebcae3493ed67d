//! Player selection
//!
//! Picks the adapter for a stream from the detected capabilities:
//!
//! | stream  | choice                                                  |
//! |---------|---------------------------------------------------------|
//! | dash    | streaming; requires buffered media                      |
//! | hls     | native when it plays HLS itself, otherwise streaming    |
//! | mp4     | native                                                  |
//! | unknown | streaming when buffered media exists, otherwise native  |
//!
//! In automatic mode a streaming adapter that cannot be built falls back
//! to the native adapter. Explicit requests never fall back.

use crate::adapter::{NativeAdapter, PlayerAdapter, StreamingAdapter};
use crate::backend::engine::EngineLoader;
use crate::backend::MediaElement;
use crate::capabilities::{Capabilities, CapabilityProvider};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::stream::detect_stream_type;
use crate::types::{PlayerType, PlayerTypePreference, StreamType};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What to create
#[derive(Debug, Clone, Default)]
pub struct CreatePlayerOptions {
    pub player_type: PlayerTypePreference,
    /// Stream the player is for; drives automatic selection
    pub stream_url: Option<String>,
    pub config: PlayerConfig,
}

impl CreatePlayerOptions {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            stream_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_player_type(mut self, player_type: PlayerTypePreference) -> Self {
        self.player_type = player_type;
        self
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }
}

/// A constructed (not yet initialized, unless stated) adapter
pub struct CreatedPlayer {
    pub player: Arc<dyn PlayerAdapter>,
    pub player_type: PlayerType,
    pub capabilities: Capabilities,
    pub config: PlayerConfig,
    /// Why automatic selection fell back to the native adapter
    pub fallback_reason: Option<String>,
}

impl std::fmt::Debug for CreatedPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedPlayer")
            .field("player_type", &self.player_type)
            .field("fallback_reason", &self.fallback_reason)
            .finish_non_exhaustive()
    }
}

/// Advisory view of what this runtime supports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSupportSummary {
    pub native: bool,
    pub streaming: bool,
    pub native_hls: bool,
    pub adaptive_manifest: bool,
    pub encrypted_media: bool,
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
    /// Choice for a stream of unknown shape
    pub recommended: PlayerType,
}

/// The decision table, as a pure function
pub fn select_player_type(stream_type: StreamType, capabilities: &Capabilities) -> Result<PlayerType> {
    match stream_type {
        StreamType::Dash if capabilities.buffered_media => Ok(PlayerType::Streaming),
        StreamType::Dash => Err(Error::UnsupportedStream {
            stream_type,
            reason: "adaptive manifests need buffered media support".to_string(),
        }),
        StreamType::Hls if capabilities.native_hls => Ok(PlayerType::Native),
        StreamType::Hls => Ok(PlayerType::Streaming),
        StreamType::Mp4 => Ok(PlayerType::Native),
        StreamType::Unknown if capabilities.buffered_media => Ok(PlayerType::Streaming),
        StreamType::Unknown => Ok(PlayerType::Native),
    }
}

/// Creates adapters from capabilities and an engine loader
pub struct PlayerFactory {
    capabilities: Arc<dyn CapabilityProvider>,
    engine_loader: Arc<dyn EngineLoader>,
}

impl PlayerFactory {
    pub fn new(capabilities: Arc<dyn CapabilityProvider>, engine_loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            capabilities,
            engine_loader,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities.capabilities()
    }

    /// Construct the adapter for `options`.
    pub fn create_player(&self, options: CreatePlayerOptions) -> Result<CreatedPlayer> {
        let capabilities = self.capabilities.capabilities();
        let stream_type = options
            .stream_url
            .as_deref()
            .map_or(StreamType::Unknown, detect_stream_type);

        let (player, player_type, fallback_reason): (Arc<dyn PlayerAdapter>, PlayerType, Option<String>) =
            match options.player_type {
                PlayerTypePreference::Native => {
                    if !capabilities.native_playback {
                        return Err(Error::PlayerTypeUnsupported {
                            player_type: PlayerType::Native,
                            reason: "no native media element in this environment".to_string(),
                        });
                    }
                    (Arc::new(NativeAdapter::new()), PlayerType::Native, None)
                }
                PlayerTypePreference::Streaming => {
                    if !capabilities.buffered_media {
                        return Err(Error::PlayerTypeUnsupported {
                            player_type: PlayerType::Streaming,
                            reason: "buffered media is not available".to_string(),
                        });
                    }
                    let adapter = StreamingAdapter::new(self.engine_loader.as_ref())?;
                    (Arc::new(adapter), PlayerType::Streaming, None)
                }
                PlayerTypePreference::Auto => match select_player_type(stream_type, &capabilities)? {
                    PlayerType::Native => (Arc::new(NativeAdapter::new()), PlayerType::Native, None),
                    PlayerType::Streaming => self.streaming_or_native(&capabilities),
                },
            };

        info!(
            %player_type,
            %stream_type,
            requested = ?options.player_type,
            fallback = fallback_reason.is_some(),
            "Player created"
        );
        Ok(CreatedPlayer {
            player,
            player_type,
            capabilities,
            config: options.config,
            fallback_reason,
        })
    }

    /// Create and initialize the adapter for `options`.
    ///
    /// In automatic mode a streaming adapter that fails to initialize is
    /// torn down and replaced by an initialized native adapter.
    pub async fn create_initialized_player(
        &self,
        options: CreatePlayerOptions,
        element: Arc<dyn MediaElement>,
    ) -> Result<CreatedPlayer> {
        let automatic = options.player_type == PlayerTypePreference::Auto;
        let mut created = self.create_player(options)?;

        match created.player.initialize(element.clone(), created.config.clone()).await {
            Ok(()) => Ok(created),
            Err(err) if automatic && created.player_type == PlayerType::Streaming => {
                warn!(error = %err, "Streaming initialization failed, falling back to native");
                created.player.destroy().await;

                let native: Arc<dyn PlayerAdapter> = Arc::new(NativeAdapter::new());
                native.initialize(element, created.config.clone()).await?;
                created.player = native;
                created.player_type = PlayerType::Native;
                created.fallback_reason = Some(err.to_string());
                Ok(created)
            }
            Err(err) => Err(err),
        }
    }

    /// Adapter automatic selection would pick for `url`
    pub fn recommended_player_type(&self, url: Option<&str>) -> Result<PlayerType> {
        let capabilities = self.capabilities.capabilities();
        let stream_type = url.map_or(StreamType::Unknown, detect_stream_type);
        select_player_type(stream_type, &capabilities)
    }

    pub fn is_player_type_supported(&self, player_type: PlayerType) -> bool {
        let capabilities = self.capabilities.capabilities();
        match player_type {
            PlayerType::Native => capabilities.native_playback,
            PlayerType::Streaming => capabilities.buffered_media,
        }
    }

    pub fn player_support_summary(&self) -> PlayerSupportSummary {
        let capabilities = self.capabilities.capabilities();
        let recommended = select_player_type(StreamType::Unknown, &capabilities)
            .unwrap_or(PlayerType::Native);
        PlayerSupportSummary {
            native: capabilities.native_playback,
            streaming: capabilities.buffered_media,
            native_hls: capabilities.native_hls,
            adaptive_manifest: capabilities.adaptive_manifest,
            encrypted_media: capabilities.encrypted_media,
            video_codecs: capabilities.video_codecs,
            audio_codecs: capabilities.audio_codecs,
            recommended,
        }
    }

    fn streaming_or_native(
        &self,
        capabilities: &Capabilities,
    ) -> (Arc<dyn PlayerAdapter>, PlayerType, Option<String>) {
        let reason = if capabilities.buffered_media {
            match StreamingAdapter::new(self.engine_loader.as_ref()) {
                Ok(adapter) => return (Arc::new(adapter), PlayerType::Streaming, None),
                Err(err) => err.to_string(),
            }
        } else {
            "buffered media is not available".to_string()
        };

        warn!(reason = %reason, "Streaming adapter unavailable, falling back to native");
        (Arc::new(NativeAdapter::new()), PlayerType::Native, Some(reason))
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::backend::engine::EngineError;
    use crate::backend::engine::Severity;
    use crate::capabilities::StaticCapabilities;
    use crate::headless::{HeadlessEngine, HeadlessEngineLoader, HeadlessMediaElement};
    use chrono::Utc;

    fn caps(buffered_media: bool, native_hls: bool) -> Capabilities {
        Capabilities {
            buffered_media,
            encrypted_media: false,
            native_hls,
            adaptive_manifest: buffered_media,
            native_playback: true,
            video_codecs: vec!["h264".into()],
            audio_codecs: vec!["aac".into()],
            detected_at: Utc::now(),
        }
    }

    fn factory(capabilities: Capabilities, loader: HeadlessEngineLoader) -> PlayerFactory {
        PlayerFactory::new(Arc::new(StaticCapabilities(capabilities)), Arc::new(loader))
    }

    #[test]
    fn test_decision_table() {
        let full = caps(true, false);
        let tv = caps(true, true);
        let bare = caps(false, false);

        assert_eq!(select_player_type(StreamType::Dash, &full).unwrap(), PlayerType::Streaming);
        assert!(matches!(
            select_player_type(StreamType::Dash, &bare),
            Err(Error::UnsupportedStream { .. })
        ));
        assert_eq!(select_player_type(StreamType::Hls, &tv).unwrap(), PlayerType::Native);
        assert_eq!(select_player_type(StreamType::Hls, &full).unwrap(), PlayerType::Streaming);
        for c in [&full, &tv, &bare] {
            assert_eq!(select_player_type(StreamType::Mp4, c).unwrap(), PlayerType::Native);
        }
        assert_eq!(select_player_type(StreamType::Unknown, &full).unwrap(), PlayerType::Streaming);
        assert_eq!(select_player_type(StreamType::Unknown, &bare).unwrap(), PlayerType::Native);
    }

    #[test]
    fn test_auto_selects_streaming_for_manifest() {
        let factory = factory(caps(true, false), HeadlessEngineLoader::with_default_ladder());
        let created = factory
            .create_player(CreatePlayerOptions::for_url("https://example.com/manifest.mpd"))
            .unwrap();
        assert_eq!(created.player_type, PlayerType::Streaming);
        assert_eq!(created.player.player_type(), PlayerType::Streaming);
        assert!(created.fallback_reason.is_none());
    }

    #[test]
    fn test_direct_file_always_native() {
        for capabilities in [caps(true, false), caps(true, true), caps(false, false)] {
            let factory = factory(capabilities, HeadlessEngineLoader::with_default_ladder());
            let created = factory
                .create_player(CreatePlayerOptions::for_url("https://example.com/clip.mp4"))
                .unwrap();
            assert_eq!(created.player_type, PlayerType::Native);
        }
    }

    #[test]
    fn test_auto_falls_back_when_engine_missing() {
        let factory = factory(caps(true, false), HeadlessEngineLoader::missing());
        let created = factory
            .create_player(CreatePlayerOptions::for_url("https://example.com/master.m3u8"))
            .unwrap();
        assert_eq!(created.player_type, PlayerType::Native);
        assert!(created.fallback_reason.is_some());
    }

    #[test]
    fn test_explicit_request_without_prerequisites() {
        let factory = factory(caps(false, false), HeadlessEngineLoader::with_default_ladder());
        let err = factory
            .create_player(
                CreatePlayerOptions::for_url("clip.mp4").with_player_type(PlayerTypePreference::Streaming),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PlayerTypeUnsupported {
                player_type: PlayerType::Streaming,
                ..
            }
        ));

        let factory = PlayerFactory::new(
            Arc::new(StaticCapabilities(caps(true, false))),
            Arc::new(HeadlessEngineLoader::missing()),
        );
        let err = factory
            .create_player(CreatePlayerOptions::default().with_player_type(PlayerTypePreference::Streaming))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONSTRUCTION");
    }

    #[tokio::test]
    async fn test_initialize_failure_falls_back_to_native() {
        let loader = HeadlessEngineLoader::new(|| {
            HeadlessEngine::new().with_attach_failure(EngineError::new(7000, Severity::Critical, "no attach"))
        });
        let factory = factory(caps(true, false), loader);
        let created = factory
            .create_initialized_player(
                CreatePlayerOptions::for_url("https://example.com/manifest.mpd"),
                Arc::new(HeadlessMediaElement::new()),
            )
            .await
            .unwrap();
        assert_eq!(created.player_type, PlayerType::Native);
        created.player.load("https://example.com/clip.mp4", false).await.unwrap();
    }

    #[test]
    fn test_advisory_helpers() {
        let factory = factory(caps(true, true), HeadlessEngineLoader::missing());
        assert_eq!(
            factory.recommended_player_type(Some("https://example.com/live.m3u8")).unwrap(),
            PlayerType::Native
        );
        assert_eq!(factory.recommended_player_type(None).unwrap(), PlayerType::Streaming);
        assert!(factory.is_player_type_supported(PlayerType::Streaming));

        let summary = factory.player_support_summary();
        assert!(summary.native_hls);
        assert_eq!(summary.recommended, PlayerType::Streaming);
    }
}
