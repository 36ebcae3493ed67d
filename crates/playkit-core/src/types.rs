//! Core types for Playkit

use crate::error::PlayerError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Initial state, no content loaded
    Idle,
    /// Source assigned, waiting for metadata
    Loading,
    /// Stalled waiting for data
    Buffering,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Playback reached the end
    Ended,
    /// Error occurred
    Error,
}

impl PlaybackState {
    /// `Ended` and `Error` only leave through an explicit reload or teardown.
    /// Playing again from `Ended` restarts the stream and counts as a reload.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Error)
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        // `Ended` also admits a replay (`play` restarts from the top), which
        // counts as a reload. Errors after the end are reported through the
        // `error` event without leaving `Ended`.
        match self {
            Ended => matches!(target, Idle | Loading | Playing | Buffering),
            Error => matches!(target, Idle | Loading),
            _ => true,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// Shape of a stream as inferred from its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// Segmented playlist (HLS)
    Hls,
    /// Manifest-based adaptive stream (DASH)
    Dash,
    /// Direct container file
    Mp4,
    Unknown,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Hls => write!(f, "hls"),
            StreamType::Dash => write!(f, "dash"),
            StreamType::Mp4 => write!(f, "mp4"),
            StreamType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Concrete adapter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    /// Platform media primitive, single rendition
    Native,
    /// Adaptive-streaming engine over buffered media
    Streaming,
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerType::Native => write!(f, "native"),
            PlayerType::Streaming => write!(f, "streaming"),
        }
    }
}

/// Adapter requested by the caller of the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerTypePreference {
    Native,
    Streaming,
    #[default]
    Auto,
}

impl std::str::FromStr for PlayerTypePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "streaming" => Ok(Self::Streaming),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown player type '{}'", other)),
        }
    }
}

/// A selectable video rendition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTrack {
    pub id: String,
    /// Display label, e.g. "1080p"
    pub label: String,
    pub height: u32,
    pub width: u32,
    /// Bits per second (0 when unknown)
    pub bitrate: u64,
    pub codec: Option<String>,
    pub frame_rate: Option<f32>,
}

/// Label used for a rendition of the given height
pub fn quality_label(height: u32) -> String {
    if height == 0 {
        "Source".to_string()
    } else {
        format!("{}p", height)
    }
}

/// Audio track information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: String,
    pub label: String,
    /// BCP-47 language code ("und" when unknown)
    pub language: String,
    /// Number of channels
    pub channels: Option<u8>,
    pub codec: Option<String>,
}

/// Subtitle or caption track information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub id: String,
    pub label: String,
    pub language: String,
    /// Closed captions (speaker identification, sound effects)
    pub is_closed_captions: bool,
    pub mime_type: Option<String>,
}

/// Snapshot of everything observable about a player.
///
/// Always handed out as an owned copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub playback_state: PlaybackState,
    /// Current position in seconds
    pub current_time: f64,
    /// Duration in seconds; infinite for live streams, 0 before metadata
    pub duration: f64,
    /// Seconds buffered ahead of the playhead
    pub buffered: f64,
    /// Volume in `0.0..=1.0`
    pub volume: f64,
    pub muted: bool,
    pub is_live: bool,
    pub is_seekable: bool,
    pub url: Option<String>,
    pub stream_type: Option<StreamType>,
    pub qualities: Vec<QualityTrack>,
    pub selected_quality: Option<QualityTrack>,
    pub is_auto_quality: bool,
    pub audio_tracks: Vec<AudioTrack>,
    pub selected_audio_track: Option<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    /// `None` means subtitles are disabled
    pub selected_subtitle_track: Option<SubtitleTrack>,
    pub error: Option<PlayerError>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            playback_state: PlaybackState::Idle,
            current_time: 0.0,
            duration: 0.0,
            buffered: 0.0,
            volume: 1.0,
            muted: false,
            is_live: false,
            is_seekable: false,
            url: None,
            stream_type: None,
            qualities: Vec::new(),
            selected_quality: None,
            is_auto_quality: true,
            audio_tracks: Vec::new(),
            selected_audio_track: None,
            subtitle_tracks: Vec::new(),
            selected_subtitle_track: None,
            error: None,
        }
    }
}

/// Events emitted by every adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerEvent {
    StateChange {
        previous: PlaybackState,
        state: PlaybackState,
    },
    TimeUpdate {
        current_time: f64,
        buffered: f64,
    },
    DurationChange {
        duration: f64,
    },
    VolumeChange {
        volume: f64,
        muted: bool,
    },
    QualityChange {
        quality: Option<QualityTrack>,
        is_auto: bool,
    },
    AudioTrackChange {
        track: AudioTrack,
    },
    SubtitleTrackChange {
        track: Option<SubtitleTrack>,
    },
    TracksLoaded {
        qualities: Vec<QualityTrack>,
        audio_tracks: Vec<AudioTrack>,
        subtitle_tracks: Vec<SubtitleTrack>,
    },
    Buffering {
        is_buffering: bool,
    },
    Error {
        error: PlayerError,
    },
    Ended,
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::StateChange { .. } => PlayerEventKind::StateChange,
            PlayerEvent::TimeUpdate { .. } => PlayerEventKind::TimeUpdate,
            PlayerEvent::DurationChange { .. } => PlayerEventKind::DurationChange,
            PlayerEvent::VolumeChange { .. } => PlayerEventKind::VolumeChange,
            PlayerEvent::QualityChange { .. } => PlayerEventKind::QualityChange,
            PlayerEvent::AudioTrackChange { .. } => PlayerEventKind::AudioTrackChange,
            PlayerEvent::SubtitleTrackChange { .. } => PlayerEventKind::SubtitleTrackChange,
            PlayerEvent::TracksLoaded { .. } => PlayerEventKind::TracksLoaded,
            PlayerEvent::Buffering { .. } => PlayerEventKind::Buffering,
            PlayerEvent::Error { .. } => PlayerEventKind::Error,
            PlayerEvent::Ended => PlayerEventKind::Ended,
        }
    }
}

/// Event type used to register listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerEventKind {
    StateChange,
    TimeUpdate,
    DurationChange,
    VolumeChange,
    QualityChange,
    AudioTrackChange,
    SubtitleTrackChange,
    TracksLoaded,
    Buffering,
    Error,
    Ended,
}

impl PlayerEventKind {
    pub const ALL: [PlayerEventKind; 11] = [
        PlayerEventKind::StateChange,
        PlayerEventKind::TimeUpdate,
        PlayerEventKind::DurationChange,
        PlayerEventKind::VolumeChange,
        PlayerEventKind::QualityChange,
        PlayerEventKind::AudioTrackChange,
        PlayerEventKind::SubtitleTrackChange,
        PlayerEventKind::TracksLoaded,
        PlayerEventKind::Buffering,
        PlayerEventKind::Error,
        PlayerEventKind::Ended,
    ];
}

/// Handle returned when registering an event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
