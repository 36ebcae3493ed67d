//! Playback adapters
//!
//! Every backend is driven through the same [`PlayerAdapter`] contract. The
//! lifecycle bookkeeping (state machine, event bus, lifecycle guards) lives
//! once in [`core::PlaybackCore`]; concrete adapters hold a core and add only
//! what is specific to their backend.
//!
//! ```text
//! caller ──► PlayerAdapter ──► backend (MediaElement / StreamingEngine)
//!    ▲                               │
//!    └──── PlayerEvent ◄── PlaybackCore ◄── MediaSignal / EngineSignal
//! ```

pub mod core;
pub mod native;
pub mod streaming;

pub use self::core::PlaybackCore;
pub use native::NativeAdapter;
pub use streaming::StreamingAdapter;

use crate::backend::MediaElement;
use crate::config::PlayerConfig;
use crate::error::Result;
use crate::types::{
    AudioTrack, ListenerId, PlayerEvent, PlayerEventKind, PlayerState, PlayerType, QualityTrack,
    StreamType, SubtitleTrack,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Callback registered for one event kind
pub type EventListener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Unified playback contract.
///
/// Control methods fail with [`crate::Error::NotInitialized`] before
/// `initialize` and after `destroy`. Track setters that match nothing are
/// silent no-ops.
#[async_trait]
pub trait PlayerAdapter: Send + Sync {
    fn player_type(&self) -> PlayerType;

    /// Bind the adapter to a media element.
    ///
    /// Applies the configured volume and mute state to the element before
    /// returning. An adapter binds exactly one element for its lifetime.
    async fn initialize(&self, element: Arc<dyn MediaElement>, config: PlayerConfig) -> Result<()>;

    /// Load a stream and wait until its tracks are known.
    ///
    /// Ends in `paused`, or `playing` when `auto_play` (or the configured
    /// `auto_play`) is set.
    async fn load(&self, url: &str, auto_play: bool) -> Result<()>;

    async fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    /// Seek to `seconds`, clamped into `[0, duration]`. Ignored for
    /// unseekable (live) streams.
    fn seek(&self, seconds: f64) -> Result<()>;

    /// Set the volume, clamped into `[0, 1]`
    fn set_volume(&self, volume: f64) -> Result<()>;

    fn mute(&self) -> Result<()>;

    fn unmute(&self) -> Result<()>;

    /// Pin a rendition, or `None` for automatic selection
    fn set_quality(&self, quality: Option<&QualityTrack>) -> Result<()>;

    fn set_audio_track(&self, track: &AudioTrack) -> Result<()>;

    /// Show a subtitle track, or `None` to disable subtitles
    fn set_subtitle_track(&self, track: Option<&SubtitleTrack>) -> Result<()>;

    /// Owned snapshot of the current state
    fn state(&self) -> PlayerState;

    fn add_event_listener(&self, kind: PlayerEventKind, listener: EventListener) -> ListenerId;

    /// Returns false when no listener with this id was registered for `kind`
    fn remove_event_listener(&self, kind: PlayerEventKind, id: ListenerId) -> bool;

    /// Classify a stream URL; adapters may recognise extra shapes
    fn detect_stream_type(&self, url: &str) -> StreamType {
        crate::stream::detect_stream_type(url)
    }

    /// Release the element and every listener. Safe to call repeatedly.
    async fn destroy(&self);
}
