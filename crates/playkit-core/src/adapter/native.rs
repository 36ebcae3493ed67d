//! Native-primitive adapter
//!
//! Drives the platform media element directly. There is a single rendition,
//! so quality switching does nothing; audio and subtitle tracks are whatever
//! the element reports in-band plus any attached subtitle files.

use super::core::PlaybackCore;
use super::{EventListener, PlayerAdapter};
use crate::backend::{
    MediaElement, MediaErrorKind, MediaFailure, MediaSignal, NativeTextTrack, ReadyState,
    SubtitleSource, TextTrackKind, TextTrackMode,
};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::types::{
    quality_label, AudioTrack, ListenerId, PlaybackState, PlayerEvent, PlayerEventKind,
    PlayerState, PlayerType, QualityTrack, SubtitleTrack,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument};

/// Id of the single quality track
pub const NATIVE_QUALITY_ID: &str = "native";

/// Id of the synthetic audio track used when the element reports none
pub const DEFAULT_AUDIO_ID: &str = "default";

/// Adapter over a bare [`MediaElement`]
pub struct NativeAdapter {
    core: Arc<PlaybackCore>,
}

impl NativeAdapter {
    pub fn new() -> Self {
        Self {
            core: PlaybackCore::new(PlayerType::Native),
        }
    }

    /// Attach an external subtitle file and refresh the subtitle list.
    ///
    /// Emits `tracksloaded` with the updated lists.
    pub fn add_subtitle_source(&self, source: &SubtitleSource) -> Result<SubtitleTrack> {
        let element = self.core.ensure_ready()?;
        let attached = element.add_text_track(source);
        debug!(url = %source.url, language = %source.language, "External subtitles attached");

        let subtitle_tracks = extract_subtitle_tracks(&element.text_tracks());
        let (qualities, audio_tracks) = self.core.update(|state| {
            state.subtitle_tracks = subtitle_tracks.clone();
            (state.qualities.clone(), state.audio_tracks.clone())
        });
        self.core.emit(PlayerEvent::TracksLoaded {
            qualities,
            audio_tracks,
            subtitle_tracks,
        });
        Ok(to_subtitle_track(&attached))
    }

    fn refresh_tracks(&self, element: &dyn MediaElement) {
        let quality = native_quality(element);
        let native_audio = element.audio_tracks();
        let audio_tracks = extract_audio_tracks(&native_audio);
        let selected_audio = native_audio
            .iter()
            .position(|track| track.enabled)
            .and_then(|index| audio_tracks.get(index))
            .or_else(|| audio_tracks.first())
            .cloned();

        let text_tracks = element.text_tracks();
        let subtitle_tracks = extract_subtitle_tracks(&text_tracks);
        let selected_subtitle = text_tracks
            .iter()
            .find(|track| track.kind.is_subtitle_like() && track.mode == TextTrackMode::Showing)
            .map(to_subtitle_track);

        debug!(
            height = quality.height,
            audio = audio_tracks.len(),
            subtitles = subtitle_tracks.len(),
            "Native tracks extracted"
        );

        self.core.update(|state| {
            state.qualities = vec![quality.clone()];
            state.selected_quality = Some(quality);
            state.is_auto_quality = false;
            state.audio_tracks = audio_tracks;
            state.selected_audio_track = selected_audio;
            state.subtitle_tracks = subtitle_tracks;
            state.selected_subtitle_track = selected_subtitle;
        });
    }
}

impl Default for NativeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerAdapter for NativeAdapter {
    fn player_type(&self) -> PlayerType {
        PlayerType::Native
    }

    #[instrument(skip(self, element, config))]
    async fn initialize(&self, element: Arc<dyn MediaElement>, config: PlayerConfig) -> Result<()> {
        self.core.begin_initialize()?;
        self.core.bind(element, config)
    }

    #[instrument(skip(self))]
    async fn load(&self, url: &str, auto_play: bool) -> Result<()> {
        let element = self.core.ensure_ready()?;
        let stream_type = self.detect_stream_type(url);
        let generation = self.core.begin_load(url, stream_type);

        element.set_source(Some(url));
        let outcome = wait_for_metadata(&element).await;

        if !self.core.is_current_load(generation) {
            debug!(url, "Load superseded or player destroyed");
            return Ok(());
        }

        if let Err(failure) = outcome {
            let err = PlayerError::media(format!("failed to load {}: {}", url, failure.message), true)
                .with_cause(failure);
            self.core.set_error(err.clone());
            return Err(err.into());
        }

        self.refresh_tracks(element.as_ref());
        self.core.apply_duration(element.duration());

        let state = self.core.snapshot();
        self.core.emit(PlayerEvent::TracksLoaded {
            qualities: state.qualities,
            audio_tracks: state.audio_tracks,
            subtitle_tracks: state.subtitle_tracks,
        });
        self.core.set_playback_state(PlaybackState::Paused);
        info!(url, duration = state.duration, "Stream ready");

        if auto_play || self.core.config().auto_play {
            self.core.play().await?;
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.core.play().await
    }

    fn pause(&self) -> Result<()> {
        self.core.pause()
    }

    fn seek(&self, seconds: f64) -> Result<()> {
        self.core.seek(seconds)
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        self.core.set_volume(volume)
    }

    fn mute(&self) -> Result<()> {
        self.core.set_muted(true)
    }

    fn unmute(&self) -> Result<()> {
        self.core.set_muted(false)
    }

    /// Single rendition: nothing to switch.
    fn set_quality(&self, _quality: Option<&QualityTrack>) -> Result<()> {
        self.core.ensure_ready()?;
        Ok(())
    }

    fn set_audio_track(&self, track: &AudioTrack) -> Result<()> {
        let element = self.core.ensure_ready()?;
        let native = element.audio_tracks();
        let Some(target) = native
            .iter()
            .find(|t| t.id == track.id)
            .or_else(|| native.iter().find(|t| t.label == track.label && t.language == track.language))
        else {
            debug!(id = %track.id, language = %track.language, "No matching audio track");
            return Ok(());
        };

        for candidate in &native {
            element.set_audio_track_enabled(&candidate.id, candidate.id == target.id);
        }

        let selected = self.core.update(|state| {
            let selected = state
                .audio_tracks
                .iter()
                .find(|t| t.id == target.id)
                .cloned()
                .unwrap_or_else(|| track.clone());
            state.selected_audio_track = Some(selected.clone());
            selected
        });
        self.core.emit(PlayerEvent::AudioTrackChange { track: selected });
        Ok(())
    }

    fn set_subtitle_track(&self, track: Option<&SubtitleTrack>) -> Result<()> {
        let element = self.core.ensure_ready()?;
        let text_tracks: Vec<NativeTextTrack> = element
            .text_tracks()
            .into_iter()
            .filter(|t| t.kind.is_subtitle_like())
            .collect();

        let target = match track {
            None => None,
            Some(track) => {
                let found = text_tracks.iter().find(|t| t.id == track.id).or_else(|| {
                    text_tracks
                        .iter()
                        .find(|t| t.label == track.label && t.language == track.language)
                });
                match found {
                    Some(found) => Some(found),
                    None => {
                        debug!(id = %track.id, language = %track.language, "No matching subtitle track");
                        return Ok(());
                    }
                }
            }
        };

        for candidate in &text_tracks {
            let mode = match target {
                Some(target) if target.id == candidate.id => TextTrackMode::Showing,
                _ => TextTrackMode::Disabled,
            };
            element.set_text_track_mode(&candidate.id, mode);
        }

        let selected = target.map(to_subtitle_track);
        self.core
            .update(|state| state.selected_subtitle_track = selected.clone());
        self.core
            .emit(PlayerEvent::SubtitleTrackChange { track: selected });
        Ok(())
    }

    fn state(&self) -> PlayerState {
        self.core.snapshot()
    }

    fn add_event_listener(&self, kind: PlayerEventKind, listener: EventListener) -> ListenerId {
        self.core.add_listener(kind, listener)
    }

    fn remove_event_listener(&self, kind: PlayerEventKind, id: ListenerId) -> bool {
        self.core.remove_listener(kind, id)
    }

    #[instrument(skip(self))]
    async fn destroy(&self) {
        if let Some(element) = self.core.element() {
            element.remove_external_text_tracks();
            element.set_source(None);
        }
        self.core.destroy();
    }
}

/// Wait once for metadata or a media error.
///
/// Resolves immediately when metadata is already available. The temporary
/// subscription is removed on every outcome.
async fn wait_for_metadata(element: &Arc<dyn MediaElement>) -> std::result::Result<(), MediaFailure> {
    if element.ready_state() >= ReadyState::HaveMetadata {
        return Ok(());
    }

    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let subscription = element.subscribe(Arc::new(move |signal: &MediaSignal| {
        let outcome = match signal {
            MediaSignal::LoadedMetadata => Ok(()),
            MediaSignal::Error(failure) => Err(failure.clone()),
            _ => return,
        };
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(outcome);
        }
    }));

    // Metadata or a failure may have landed before the subscription.
    let outcome = if element.ready_state() >= ReadyState::HaveMetadata {
        Ok(())
    } else if let Some(failure) = element.error() {
        Err(failure)
    } else {
        rx.await.unwrap_or_else(|_| {
            Err(MediaFailure::new(
                MediaErrorKind::Aborted,
                "media element dropped the metadata listener",
            ))
        })
    };
    element.unsubscribe(subscription);
    outcome
}

fn native_quality(element: &dyn MediaElement) -> QualityTrack {
    let height = element.video_height();
    QualityTrack {
        id: NATIVE_QUALITY_ID.to_string(),
        label: quality_label(height),
        height,
        width: element.video_width(),
        bitrate: 0,
        codec: None,
        frame_rate: None,
    }
}

fn extract_audio_tracks(native: &[crate::backend::NativeAudioTrack]) -> Vec<AudioTrack> {
    if native.is_empty() {
        return vec![AudioTrack {
            id: DEFAULT_AUDIO_ID.to_string(),
            label: "Default".to_string(),
            language: "und".to_string(),
            channels: None,
            codec: None,
        }];
    }

    native
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let language = if track.language.is_empty() {
                "und".to_string()
            } else {
                track.language.clone()
            };
            let label = if !track.label.is_empty() {
                track.label.clone()
            } else if !track.language.is_empty() {
                track.language.clone()
            } else {
                format!("Track {}", index + 1)
            };
            AudioTrack {
                id: track.id.clone(),
                label,
                language,
                channels: None,
                codec: None,
            }
        })
        .collect()
}

fn extract_subtitle_tracks(text_tracks: &[NativeTextTrack]) -> Vec<SubtitleTrack> {
    text_tracks
        .iter()
        .filter(|track| track.kind.is_subtitle_like())
        .map(to_subtitle_track)
        .collect()
}

fn to_subtitle_track(track: &NativeTextTrack) -> SubtitleTrack {
    SubtitleTrack {
        id: track.id.clone(),
        label: if track.label.is_empty() {
            track.language.clone()
        } else {
            track.label.clone()
        },
        language: track.language.clone(),
        is_closed_captions: track.kind == TextTrackKind::Captions,
        mime_type: track.mime_type.clone(),
    }
}
