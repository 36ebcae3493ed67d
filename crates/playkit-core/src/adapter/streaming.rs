//! Adaptive-streaming adapter
//!
//! Drives a [`StreamingEngine`] attached to a media element. Quality, audio
//! and subtitle lists are rebuilt from the engine's variant and text tracks;
//! the engine stays the source of truth for which ones are active.

use super::core::PlaybackCore;
use super::{EventListener, PlayerAdapter};
use crate::backend::engine::{
    EngineConfig, EngineError, EngineLoader, EngineSignal, EngineTextTrack, Severity,
    StreamingEngine, VariantTrack,
};
use crate::backend::MediaElement;
use crate::config::{PlayerConfig, QualityPreference};
use crate::error::{ConstructionError, ErrorCode, PlayerError, Result};
use crate::types::{
    quality_label, AudioTrack, ListenerId, PlaybackState, PlayerEvent, PlayerEventKind,
    PlayerState, PlayerType, QualityTrack, StreamType, SubtitleTrack,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument};

/// Adapter over an adaptive-streaming engine
pub struct StreamingAdapter {
    inner: Arc<StreamingInner>,
}

struct StreamingInner {
    core: Arc<PlaybackCore>,
    engine: Arc<dyn StreamingEngine>,
    /// Last reported (active quality id, auto) pair
    reported_quality: Mutex<Option<(Option<String>, bool)>>,
}

impl StreamingAdapter {
    /// Load the engine library. Fails when it is missing from this build.
    pub fn new(loader: &dyn EngineLoader) -> std::result::Result<Self, ConstructionError> {
        let engine = loader.load()?;
        Ok(Self::with_engine(engine))
    }

    pub fn with_engine(engine: Arc<dyn StreamingEngine>) -> Self {
        Self {
            inner: Arc::new(StreamingInner {
                core: PlaybackCore::new(PlayerType::Streaming),
                engine,
                reported_quality: Mutex::new(None),
            }),
        }
    }

    fn fail_initialize(&self, message: String, cause: Option<EngineError>) -> crate::Error {
        let mut err = PlayerError::media(message, false);
        if let Some(cause) = cause {
            err = err.with_cause(cause);
        }
        self.inner.core.abort_initialize();
        self.inner.core.set_error(err.clone());
        err.into()
    }

    fn apply_preferences(&self, config: &PlayerConfig) {
        let engine = &self.inner.engine;
        let variants = engine.variant_tracks();

        match config.preferred_quality {
            QualityPreference::Auto => engine.set_abr_enabled(true),
            QualityPreference::Height(height) => {
                match best_variant(&variants, |v| v.height == Some(height)) {
                    Some(variant) => {
                        engine.set_abr_enabled(false);
                        engine.select_variant(variant.id, false);
                    }
                    None => {
                        debug!(height, "Preferred quality not offered, keeping automatic selection");
                        engine.set_abr_enabled(true);
                    }
                }
            }
        }

        if let Some(language) = &config.preferred_audio_language {
            if variants.iter().any(|v| &v.language == language) {
                engine.select_audio_language(language);
            } else {
                debug!(%language, "Preferred audio language not offered");
            }
        }

        if let Some(language) = &config.preferred_subtitle_language {
            match engine
                .text_tracks()
                .into_iter()
                .find(|t| t.kind.is_subtitle_like() && &t.language == language)
            {
                Some(track) => {
                    engine.select_text_track(track.id);
                    engine.set_text_visibility(true);
                }
                None => debug!(%language, "Preferred subtitle language not offered"),
            }
        }
    }
}

impl StreamingInner {
    /// Rebuild every track list from the engine
    fn rebuild_tracks(&self) {
        let variants = self.engine.variant_tracks();
        let qualities = build_qualities(&variants);
        let audio_tracks = build_audio_tracks(&variants);
        let subtitle_tracks: Vec<SubtitleTrack> = self
            .engine
            .text_tracks()
            .iter()
            .filter(|t| t.kind.is_subtitle_like())
            .map(to_subtitle_track)
            .collect();

        debug!(
            variants = variants.len(),
            qualities = qualities.len(),
            audio = audio_tracks.len(),
            subtitles = subtitle_tracks.len(),
            "Engine tracks rebuilt"
        );

        self.core.update(|state| {
            state.qualities = qualities;
            state.audio_tracks = audio_tracks;
            state.subtitle_tracks = subtitle_tracks;
        });
    }

    /// Re-derive the active quality, audio and subtitle selections from the
    /// engine, emitting change events for whatever moved when `emit` is set.
    fn reconcile_active_tracks(&self, emit: bool) {
        let variants = self.engine.variant_tracks();
        let active = variants.iter().find(|v| v.active);
        let is_auto = self.engine.abr_enabled();
        let subtitle = if self.engine.is_text_visible() {
            self.engine
                .text_tracks()
                .iter()
                .find(|t| t.active && t.kind.is_subtitle_like())
                .map(to_subtitle_track)
        } else {
            None
        };

        let (active_quality, audio, audio_changed, subtitle_changed) =
            self.core.update(|state| {
                let active_quality = active.and_then(|variant| {
                    state
                        .qualities
                        .iter()
                        .find(|q| Some(q.height) == variant.height)
                        .cloned()
                });
                state.is_auto_quality = is_auto;
                state.selected_quality = if is_auto { None } else { active_quality.clone() };

                let audio = active.and_then(|variant| {
                    let language = normalize_language(&variant.language);
                    state
                        .audio_tracks
                        .iter()
                        .find(|t| t.language == language && Some(&t.label) == variant.label.as_ref())
                        .or_else(|| state.audio_tracks.iter().find(|t| t.language == language))
                        .cloned()
                });
                let audio_changed = audio.is_some() && audio != state.selected_audio_track;
                if audio.is_some() {
                    state.selected_audio_track = audio.clone();
                }

                let subtitle_changed = subtitle != state.selected_subtitle_track;
                state.selected_subtitle_track = subtitle.clone();

                (active_quality, audio, audio_changed, subtitle_changed)
            });

        let reported = (active_quality.as_ref().map(|q| q.id.clone()), is_auto);
        let quality_changed = self.reported_quality.lock().replace(reported.clone()) != Some(reported);

        if !emit {
            return;
        }
        if quality_changed {
            self.core.emit(PlayerEvent::QualityChange {
                quality: active_quality,
                is_auto,
            });
        }
        if audio_changed {
            if let Some(track) = audio {
                self.core.emit(PlayerEvent::AudioTrackChange { track });
            }
        }
        if subtitle_changed {
            self.core
                .emit(PlayerEvent::SubtitleTrackChange { track: subtitle });
        }
    }

    fn handle_engine_signal(&self, signal: &EngineSignal) {
        if !self.core.is_active() {
            return;
        }
        // The load path rebuilds and reports tracks itself.
        let loading = matches!(
            self.core.playback_state(),
            PlaybackState::Idle | PlaybackState::Loading
        );

        match signal {
            EngineSignal::Adaptation | EngineSignal::VariantChanged | EngineSignal::TextChanged
                if !loading =>
            {
                self.reconcile_active_tracks(true);
            }
            EngineSignal::TracksChanged if !loading => {
                self.rebuild_tracks();
                self.reconcile_active_tracks(true);
                let state = self.core.snapshot();
                self.core.emit(PlayerEvent::TracksLoaded {
                    qualities: state.qualities,
                    audio_tracks: state.audio_tracks,
                    subtitle_tracks: state.subtitle_tracks,
                });
            }
            EngineSignal::Buffering(is_buffering) if !loading => {
                let current = self.core.playback_state();
                let next = if *is_buffering {
                    (current == PlaybackState::Playing).then_some(PlaybackState::Buffering)
                } else if current == PlaybackState::Buffering {
                    let paused = self.core.element().map_or(true, |e| e.is_paused());
                    Some(if paused { PlaybackState::Paused } else { PlaybackState::Playing })
                } else {
                    None
                };
                // The element may already have reported this stall.
                if next.is_some_and(|next| self.core.set_playback_state(next)) {
                    self.core.emit(PlayerEvent::Buffering {
                        is_buffering: *is_buffering,
                    });
                }
            }
            EngineSignal::Error(err) if !loading => {
                let classified = classify_engine_error(err);
                if err.severity == Severity::Critical {
                    self.core.set_error(classified);
                } else {
                    self.core.notify_error(classified);
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl PlayerAdapter for StreamingAdapter {
    fn player_type(&self) -> PlayerType {
        PlayerType::Streaming
    }

    #[instrument(skip(self, element, config))]
    async fn initialize(&self, element: Arc<dyn MediaElement>, config: PlayerConfig) -> Result<()> {
        let core = &self.inner.core;
        let engine = &self.inner.engine;
        core.begin_initialize()?;

        if !engine.is_supported() {
            return Err(self.fail_initialize(
                "streaming engine is not supported in this environment".to_string(),
                None,
            ));
        }
        let attached = engine.attach(element.clone()).await;
        // Teardown may have landed while attaching; the engine is ours to release.
        if let Err(err) = core.check_initializing() {
            debug!("Player torn down during initialization");
            engine.destroy().await;
            return Err(err);
        }
        if let Err(err) = attached {
            return Err(self.fail_initialize(
                format!("failed to attach streaming engine: {}", err.message),
                Some(err),
            ));
        }
        engine.configure(&EngineConfig::from(&config));

        let weak: Weak<StreamingInner> = Arc::downgrade(&self.inner);
        let subscription = engine.subscribe(Arc::new(move |signal: &EngineSignal| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_engine_signal(signal);
            }
        }));
        let detach_engine = engine.clone();
        core.add_detach_hook(move || detach_engine.unsubscribe(subscription));

        if let Err(err) = core.bind(element, config) {
            engine.destroy().await;
            return Err(err);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, url: &str, auto_play: bool) -> Result<()> {
        let core = &self.inner.core;
        core.ensure_ready()?;
        let stream_type = self.detect_stream_type(url);
        let generation = core.begin_load(url, stream_type);

        let outcome = self.inner.engine.load(url).await;
        if !core.is_current_load(generation) {
            debug!(url, "Load superseded or player destroyed");
            return Ok(());
        }
        if let Err(err) = outcome {
            let player_err =
                PlayerError::media(format!("failed to load {}: {}", url, err.message), true)
                    .with_cause(err);
            core.set_error(player_err.clone());
            return Err(player_err.into());
        }

        let config = core.config();
        self.inner.rebuild_tracks();
        self.apply_preferences(&config);
        self.inner.reconcile_active_tracks(false);

        if let Some(element) = core.element() {
            core.apply_duration(element.duration());
        }
        let is_live = self.inner.engine.is_live();
        if is_live {
            core.mark_live();
        }

        let state = core.snapshot();
        core.emit(PlayerEvent::TracksLoaded {
            qualities: state.qualities,
            audio_tracks: state.audio_tracks,
            subtitle_tracks: state.subtitle_tracks,
        });
        core.set_playback_state(PlaybackState::Paused);
        info!(url, is_live, "Stream ready");

        if auto_play || config.auto_play {
            core.play().await?;
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.inner.core.play().await
    }

    fn pause(&self) -> Result<()> {
        self.inner.core.pause()
    }

    fn seek(&self, seconds: f64) -> Result<()> {
        self.inner.core.seek(seconds)
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        self.inner.core.set_volume(volume)
    }

    fn mute(&self) -> Result<()> {
        self.inner.core.set_muted(true)
    }

    fn unmute(&self) -> Result<()> {
        self.inner.core.set_muted(false)
    }

    fn set_quality(&self, quality: Option<&QualityTrack>) -> Result<()> {
        self.inner.core.ensure_ready()?;
        let engine = &self.inner.engine;

        match quality {
            None => engine.set_abr_enabled(true),
            Some(quality) => {
                let variants = engine.variant_tracks();
                let Some(variant) = best_variant(&variants, |v| {
                    v.height == Some(quality.height)
                        && (quality.width == 0 || v.width == Some(quality.width))
                }) else {
                    debug!(height = quality.height, width = quality.width, "No matching variant");
                    return Ok(());
                };
                engine.set_abr_enabled(false);
                engine.select_variant(variant.id, true);
            }
        }
        self.inner.reconcile_active_tracks(true);
        Ok(())
    }

    fn set_audio_track(&self, track: &AudioTrack) -> Result<()> {
        self.inner.core.ensure_ready()?;
        let engine = &self.inner.engine;
        let offered = engine
            .variant_tracks()
            .iter()
            .any(|v| normalize_language(&v.language) == track.language);
        if !offered {
            debug!(language = %track.language, "No matching audio language");
            return Ok(());
        }
        engine.select_audio_language(&track.language);
        self.inner.reconcile_active_tracks(true);
        Ok(())
    }

    fn set_subtitle_track(&self, track: Option<&SubtitleTrack>) -> Result<()> {
        self.inner.core.ensure_ready()?;
        let engine = &self.inner.engine;

        match track {
            None => engine.set_text_visibility(false),
            Some(track) => {
                let Some(target) = engine.text_tracks().into_iter().find(|t| {
                    t.kind.is_subtitle_like()
                        && t.language == track.language
                        && text_track_label(t) == track.label
                }) else {
                    debug!(language = %track.language, label = %track.label, "No matching subtitle track");
                    return Ok(());
                };
                engine.select_text_track(target.id);
                engine.set_text_visibility(true);
            }
        }
        self.inner.reconcile_active_tracks(true);
        Ok(())
    }

    fn state(&self) -> PlayerState {
        self.inner.core.snapshot()
    }

    fn add_event_listener(&self, kind: PlayerEventKind, listener: EventListener) -> ListenerId {
        self.inner.core.add_listener(kind, listener)
    }

    fn remove_event_listener(&self, kind: PlayerEventKind, id: ListenerId) -> bool {
        self.inner.core.remove_listener(kind, id)
    }

    /// Recognises `format=m3u8-*` and `format=mpd-*` query parameters
    /// used by packagers that serve manifests without an extension.
    fn detect_stream_type(&self, url: &str) -> StreamType {
        let query = url
            .split_once('?')
            .map(|(_, rest)| rest.split('#').next().unwrap_or_default())
            .unwrap_or_default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if !key.eq_ignore_ascii_case("format") {
                continue;
            }
            let value = value.to_lowercase();
            if value.starts_with("m3u8") {
                return StreamType::Hls;
            }
            if value.starts_with("mpd") {
                return StreamType::Dash;
            }
        }
        crate::stream::detect_stream_type(url)
    }

    #[instrument(skip(self))]
    async fn destroy(&self) {
        let core = &self.inner.core;
        if core.element().is_some() {
            self.inner.engine.destroy().await;
        }
        core.destroy();
        *self.inner.reported_quality.lock() = None;
    }
}

/// Map an engine error into the shared taxonomy by code range
pub fn classify_engine_error(err: &EngineError) -> PlayerError {
    let code = match err.code {
        1000..=1999 => ErrorCode::NetworkError,
        3000..=3999 => ErrorCode::MediaError,
        4000..=4999 => ErrorCode::ManifestError,
        5000..=5999 => ErrorCode::SegmentError,
        6000..=6999 => ErrorCode::DrmError,
        _ => ErrorCode::Unknown,
    };
    PlayerError::new(code, err.message.clone(), err.severity == Severity::Recoverable)
        .with_cause(err.clone())
}

/// One quality per distinct height, keeping the highest bandwidth, tallest
/// first. Audio-only variants are skipped.
fn build_qualities(variants: &[VariantTrack]) -> Vec<QualityTrack> {
    let mut by_height: BTreeMap<u32, &VariantTrack> = BTreeMap::new();
    for variant in variants {
        let Some(height) = variant.height else {
            continue;
        };
        by_height
            .entry(height)
            .and_modify(|best| {
                if variant.bandwidth > best.bandwidth {
                    *best = variant;
                }
            })
            .or_insert(variant);
    }

    by_height
        .into_iter()
        .rev()
        .map(|(height, variant)| QualityTrack {
            id: variant.id.to_string(),
            label: quality_label(height),
            height,
            width: variant.width.unwrap_or(0),
            bitrate: variant.bandwidth,
            codec: variant.video_codec.clone(),
            frame_rate: variant.frame_rate,
        })
        .collect()
}

/// One audio track per (language, label) pair, in manifest order
fn build_audio_tracks(variants: &[VariantTrack]) -> Vec<AudioTrack> {
    let mut tracks: Vec<AudioTrack> = Vec::new();
    for variant in variants {
        let language = normalize_language(&variant.language);
        let label = variant.label.clone().unwrap_or_else(|| language.clone());
        if tracks.iter().any(|t| t.language == language && t.label == label) {
            continue;
        }
        tracks.push(AudioTrack {
            id: format!("{}-{}", language, tracks.len()),
            label,
            language,
            channels: variant.channels,
            codec: variant.audio_codec.clone(),
        });
    }
    tracks
}

fn best_variant<'a>(
    variants: &'a [VariantTrack],
    predicate: impl Fn(&VariantTrack) -> bool,
) -> Option<&'a VariantTrack> {
    variants
        .iter()
        .filter(|v| predicate(v))
        .max_by_key(|v| (v.active, v.bandwidth))
}

fn normalize_language(language: &str) -> String {
    if language.is_empty() {
        "und".to_string()
    } else {
        language.to_string()
    }
}

fn text_track_label(track: &EngineTextTrack) -> String {
    track.label.clone().unwrap_or_else(|| track.language.clone())
}

fn to_subtitle_track(track: &EngineTextTrack) -> SubtitleTrack {
    SubtitleTrack {
        id: track.id.to_string(),
        label: text_track_label(track),
        language: track.language.clone(),
        is_closed_captions: track.kind == crate::backend::TextTrackKind::Captions,
        mime_type: track.mime_type.clone(),
    }
}
