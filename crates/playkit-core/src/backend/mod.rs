//! Backend traits implemented by the host
//!
//! These traits are the contract between the adapters and whatever actually
//! decodes and renders media. Host platforms provide the implementations:
//!
//! - [`MediaElement`] - the platform media primitive (a video element, a
//!   native player surface). Every adapter binds exactly one.
//! - [`engine::StreamingEngine`] - an adaptive-streaming engine that drives a
//!   media element over buffered segments.
//!
//! Signals flow back through listeners registered with `subscribe`. A backend
//! may invoke listeners synchronously from inside any of its methods, so
//! callers must not hold locks across backend calls.

pub mod engine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// How much of the media the element has available
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Failure categories reported by a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

impl MediaErrorKind {
    /// Map the numeric codes used by HTML media elements
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(MediaErrorKind::Aborted),
            2 => Some(MediaErrorKind::Network),
            3 => Some(MediaErrorKind::Decode),
            4 => Some(MediaErrorKind::SrcNotSupported),
            _ => None,
        }
    }
}

/// Error reported by the media element itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("media element error ({kind:?}): {message}")]
pub struct MediaFailure {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaFailure {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors returned by backend operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The platform refused the request (e.g. autoplay policy)
    #[error("operation not allowed: {0}")]
    NotAllowed(String),

    /// A newer request superseded this one
    #[error("operation aborted: {0}")]
    Aborted(String),

    #[error("backend failure: {0}")]
    Failed(String),
}

/// Signals emitted by a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSignal {
    LoadedMetadata,
    CanPlay,
    Playing,
    Pause,
    Waiting,
    TimeUpdate,
    Progress,
    DurationChange,
    VolumeChange,
    Ended,
    Error(MediaFailure),
}

/// Handle for a backend listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener for media element signals
pub type SignalListener = Arc<dyn Fn(&MediaSignal) + Send + Sync>;

/// Text track type (captions, subtitles, descriptions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackKind {
    /// Closed captions (includes speaker identification, sound effects)
    Captions,
    /// Subtitles (dialogue translation)
    Subtitles,
    /// Audio descriptions for visually impaired
    Descriptions,
    Chapters,
    Metadata,
}

impl TextTrackKind {
    /// Tracks that are presented to the viewer as subtitles
    pub fn is_subtitle_like(&self) -> bool {
        matches!(self, TextTrackKind::Captions | TextTrackKind::Subtitles)
    }
}

/// Presentation mode of a text track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextTrackMode {
    Disabled,
    Hidden,
    Showing,
}

/// In-band audio track reported by the media element
#[derive(Debug, Clone, PartialEq)]
pub struct NativeAudioTrack {
    pub id: String,
    pub label: String,
    pub language: String,
    pub enabled: bool,
}

/// Text track reported by the media element
#[derive(Debug, Clone, PartialEq)]
pub struct NativeTextTrack {
    pub id: String,
    pub kind: TextTrackKind,
    pub label: String,
    pub language: String,
    pub mode: TextTrackMode,
    /// Attached from an external file rather than found in-band
    pub external: bool,
    pub mime_type: Option<String>,
}

/// External subtitle file to attach to a media element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSource {
    pub url: String,
    pub language: String,
    pub label: String,
    pub kind: TextTrackKind,
    pub mime_type: Option<String>,
}

impl SubtitleSource {
    /// A WebVTT subtitles file
    pub fn webvtt(url: impl Into<String>, language: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            language: language.into(),
            label: label.into(),
            kind: TextTrackKind::Subtitles,
            mime_type: Some("text/vtt".to_string()),
        }
    }
}

/// The platform media primitive.
///
/// Times are in seconds. `duration` is NaN before metadata and infinite for
/// unbounded (live) streams.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Assign (or clear, with `None`) the media source
    fn set_source(&self, url: Option<&str>);

    fn source(&self) -> Option<String>;

    fn ready_state(&self) -> ReadyState;

    /// Failure of the current source, cleared by `set_source`
    fn error(&self) -> Option<MediaFailure>;

    /// Start playback; may be refused by platform policy
    async fn play(&self) -> Result<(), BackendError>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    fn duration(&self) -> f64;

    /// End of the buffered range containing the playhead
    fn buffered_end(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// Intrinsic video width (0 when unknown or audio-only)
    fn video_width(&self) -> u32;

    /// Intrinsic video height (0 when unknown or audio-only)
    fn video_height(&self) -> u32;

    fn audio_tracks(&self) -> Vec<NativeAudioTrack>;

    fn set_audio_track_enabled(&self, id: &str, enabled: bool);

    fn text_tracks(&self) -> Vec<NativeTextTrack>;

    fn set_text_track_mode(&self, id: &str, mode: TextTrackMode);

    /// Attach an external text track, returning its description
    fn add_text_track(&self, source: &SubtitleSource) -> NativeTextTrack;

    /// Remove every text track previously attached with `add_text_track`
    fn remove_external_text_tracks(&self);

    fn subscribe(&self, listener: SignalListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}
