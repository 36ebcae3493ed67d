//! Headless backends
//!
//! In-memory implementations of the host traits: a [`PlatformProfile`] that
//! answers capability probes, a [`HeadlessMediaElement`] and a
//! [`HeadlessEngine`]. They never decode anything; they report what a real
//! backend would and dispatch the same signals, which makes them useful for
//! simulation and tests.

use crate::backend::engine::{
    EngineConfig, EngineError, EngineListener, EngineLoader, EngineSignal, EngineTextTrack,
    StreamingEngine, VariantTrack,
};
use crate::backend::{
    BackendError, MediaElement, MediaErrorKind, MediaFailure, MediaSignal, NativeAudioTrack,
    NativeTextTrack, ReadyState, SignalListener, SubscriptionId, SubtitleSource, TextTrackMode,
};
use crate::capabilities::{
    CanPlay, MediaPlatform, ProbeError, ADAPTIVE_BASELINE_MIME, AUDIO_CODEC_CANDIDATES, HLS_MIME,
    VIDEO_CODEC_CANDIDATES,
};
use crate::error::{ConstructionError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

// ============================================================================
// Platform profile
// ============================================================================

/// Static description of a host platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProfile {
    pub name: String,
    /// False for environments without a UI context; every probe then fails
    pub ui_context: bool,
    pub media_element: bool,
    pub buffered_media: bool,
    pub key_systems: bool,
    pub native_hls: bool,
    /// Playable video codec ids (see `VIDEO_CODEC_CANDIDATES`)
    pub video_codecs: Vec<String>,
    /// Playable audio codec ids (see `AUDIO_CODEC_CANDIDATES`)
    pub audio_codecs: Vec<String>,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::desktop_browser()
    }
}

impl PlatformProfile {
    /// Evergreen desktop browser: buffered media, no built-in HLS
    pub fn desktop_browser() -> Self {
        Self {
            name: "desktop-browser".to_string(),
            ui_context: true,
            media_element: true,
            buffered_media: true,
            key_systems: true,
            native_hls: false,
            video_codecs: strings(&["h264", "h264-high", "vp8", "vp9", "av1"]),
            audio_codecs: strings(&["aac", "he-aac", "mp3", "opus", "vorbis", "flac"]),
        }
    }

    /// Smart TV: built-in HLS and surround audio
    pub fn smart_tv() -> Self {
        Self {
            name: "smart-tv".to_string(),
            ui_context: true,
            media_element: true,
            buffered_media: true,
            key_systems: true,
            native_hls: true,
            video_codecs: strings(&["h264", "h264-high", "hevc"]),
            audio_codecs: strings(&["aac", "he-aac", "mp3", "ac3", "eac3"]),
        }
    }

    /// No UI context at all (server-side rendering, workers)
    pub fn headless() -> Self {
        Self {
            name: "headless".to_string(),
            ui_context: false,
            media_element: false,
            buffered_media: false,
            key_systems: false,
            native_hls: false,
            video_codecs: Vec::new(),
            audio_codecs: Vec::new(),
        }
    }

    /// Parse a (possibly partial) JSON profile
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn guard(&self, facility: &str) -> std::result::Result<(), ProbeError> {
        if self.ui_context {
            Ok(())
        } else {
            Err(ProbeError::Unavailable(format!("{} requires a UI context", facility)))
        }
    }

    fn codec_for_mime(&self, mime: &str) -> bool {
        let lookup = |candidates: &[crate::capabilities::CodecCandidate], enabled: &[String]| {
            candidates
                .iter()
                .find(|c| c.mime == mime)
                .map(|c| enabled.iter().any(|id| id == c.id))
        };
        lookup(VIDEO_CODEC_CANDIDATES, &self.video_codecs)
            .or_else(|| lookup(AUDIO_CODEC_CANDIDATES, &self.audio_codecs))
            .unwrap_or(false)
    }
}

impl MediaPlatform for PlatformProfile {
    fn has_media_element(&self) -> std::result::Result<bool, ProbeError> {
        self.guard("media element")?;
        Ok(self.media_element)
    }

    fn has_buffered_media(&self) -> std::result::Result<bool, ProbeError> {
        self.guard("buffered media")?;
        Ok(self.buffered_media)
    }

    fn is_type_supported(&self, mime: &str) -> std::result::Result<bool, ProbeError> {
        self.guard("buffered media")?;
        if !self.buffered_media {
            return Ok(false);
        }
        if mime == ADAPTIVE_BASELINE_MIME {
            let has = |list: &[String], id: &str| list.iter().any(|c| c == id);
            return Ok(has(&self.video_codecs, "h264") && has(&self.audio_codecs, "aac"));
        }
        Ok(self.codec_for_mime(mime))
    }

    fn can_play_type(&self, mime: &str) -> std::result::Result<CanPlay, ProbeError> {
        self.guard("media element")?;
        if !self.media_element {
            return Ok(CanPlay::No);
        }
        let playable = if mime == HLS_MIME {
            self.native_hls
        } else {
            self.codec_for_mime(mime)
        };
        Ok(if playable { CanPlay::Probably } else { CanPlay::No })
    }

    fn has_key_system_access(&self) -> std::result::Result<bool, ProbeError> {
        self.guard("key systems")?;
        Ok(self.key_systems)
    }
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ============================================================================
// Media element
// ============================================================================

/// How the element reacts to a new source
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBehavior {
    /// Metadata is available as soon as the source is set
    Immediate,
    /// Waits for [`HeadlessMediaElement::finish_loading`]
    Deferred,
    /// The source fails with this error
    Fail(MediaFailure),
}

struct ElementState {
    source: Option<String>,
    ready_state: ReadyState,
    error: Option<MediaFailure>,
    paused: bool,
    current_time: f64,
    duration: f64,
    media_duration: f64,
    volume: f64,
    muted: bool,
    width: u32,
    height: u32,
    audio_tracks: Vec<NativeAudioTrack>,
    text_tracks: Vec<NativeTextTrack>,
    next_external_id: u32,
    load_behavior: LoadBehavior,
    play_refusal: Option<BackendError>,
}

/// In-memory media element
pub struct HeadlessMediaElement {
    state: Mutex<ElementState>,
    listeners: Mutex<Vec<(SubscriptionId, SignalListener)>>,
}

impl HeadlessMediaElement {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ElementState {
                source: None,
                ready_state: ReadyState::HaveNothing,
                error: None,
                paused: true,
                current_time: 0.0,
                duration: f64::NAN,
                media_duration: 60.0,
                volume: 1.0,
                muted: false,
                width: 1280,
                height: 720,
                audio_tracks: Vec::new(),
                text_tracks: Vec::new(),
                next_external_id: 0,
                load_behavior: LoadBehavior::Immediate,
                play_refusal: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_video_size(self, width: u32, height: u32) -> Self {
        {
            let mut state = self.state.lock();
            state.width = width;
            state.height = height;
        }
        self
    }

    /// Duration reported once metadata loads; `f64::INFINITY` for live
    pub fn with_duration(self, seconds: f64) -> Self {
        self.state.lock().media_duration = seconds;
        self
    }

    pub fn with_audio_tracks(self, tracks: Vec<NativeAudioTrack>) -> Self {
        self.state.lock().audio_tracks = tracks;
        self
    }

    pub fn with_text_tracks(self, tracks: Vec<NativeTextTrack>) -> Self {
        self.state.lock().text_tracks = tracks;
        self
    }

    pub fn with_load_behavior(self, behavior: LoadBehavior) -> Self {
        self.state.lock().load_behavior = behavior;
        self
    }

    pub fn with_load_failure(self, failure: MediaFailure) -> Self {
        self.with_load_behavior(LoadBehavior::Fail(failure))
    }

    /// Refuse `play` requests, as an autoplay policy would
    pub fn with_play_refusal(self, refusal: BackendError) -> Self {
        self.state.lock().play_refusal = Some(refusal);
        self
    }

    /// Dispatch a signal to every subscriber
    pub fn emit(&self, signal: MediaSignal) {
        let listeners: Vec<SignalListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Complete a deferred load
    pub fn finish_loading(&self) {
        {
            let mut state = self.state.lock();
            if state.source.is_none() {
                return;
            }
            state.ready_state = ReadyState::HaveEnoughData;
            state.duration = state.media_duration;
        }
        self.emit(MediaSignal::LoadedMetadata);
        self.emit(MediaSignal::DurationChange);
        self.emit(MediaSignal::CanPlay);
    }

    /// Fail the current source
    pub fn fail(&self, failure: MediaFailure) {
        self.state.lock().error = Some(failure.clone());
        self.emit(MediaSignal::Error(failure));
    }

    /// Advance the playhead, ending playback at the duration
    pub fn advance(&self, seconds: f64) {
        let ended = {
            let mut state = self.state.lock();
            state.current_time += seconds;
            if state.duration.is_finite() && state.current_time >= state.duration {
                state.current_time = state.duration;
                state.paused = true;
                true
            } else {
                false
            }
        };
        self.emit(MediaSignal::TimeUpdate);
        if ended {
            self.emit(MediaSignal::Pause);
            self.emit(MediaSignal::Ended);
        }
    }

    /// Simulate a stall while playing
    pub fn stall(&self) {
        self.emit(MediaSignal::Waiting);
    }
}

impl Default for HeadlessMediaElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for HeadlessMediaElement {
    fn set_source(&self, url: Option<&str>) {
        let (behavior, aborted) = {
            let mut state = self.state.lock();
            let aborted = state.source.is_some()
                && state.ready_state == ReadyState::HaveNothing
                && state.error.is_none();
            state.source = url.map(str::to_string);
            state.ready_state = ReadyState::HaveNothing;
            state.error = None;
            state.paused = true;
            state.current_time = 0.0;
            state.duration = f64::NAN;
            (state.load_behavior.clone(), aborted)
        };
        // A pending load is cut short without recording an element error.
        if aborted {
            self.emit(MediaSignal::Error(MediaFailure::new(
                MediaErrorKind::Aborted,
                "load aborted",
            )));
        }
        if url.is_none() {
            return;
        }

        match behavior {
            LoadBehavior::Immediate => self.finish_loading(),
            LoadBehavior::Deferred => {}
            LoadBehavior::Fail(failure) => self.fail(failure),
        }
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn error(&self) -> Option<MediaFailure> {
        self.state.lock().error.clone()
    }

    async fn play(&self) -> std::result::Result<(), BackendError> {
        {
            let mut state = self.state.lock();
            if let Some(refusal) = &state.play_refusal {
                return Err(refusal.clone());
            }
            if !state.paused {
                return Ok(());
            }
            if state.duration.is_finite() && state.current_time >= state.duration {
                state.current_time = 0.0;
            }
            state.paused = false;
        }
        self.emit(MediaSignal::Playing);
        Ok(())
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.paused, true)
        };
        if was_playing {
            self.emit(MediaSignal::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().current_time = seconds;
        self.emit(MediaSignal::TimeUpdate);
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn buffered_end(&self) -> f64 {
        let state = self.state.lock();
        if state.ready_state < ReadyState::HaveMetadata {
            return 0.0;
        }
        (state.current_time + 10.0).min(state.duration)
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.volume, volume) != volume
        };
        if changed {
            self.emit(MediaSignal::VolumeChange);
        }
    }

    fn muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.muted, muted) != muted
        };
        if changed {
            self.emit(MediaSignal::VolumeChange);
        }
    }

    fn video_width(&self) -> u32 {
        let state = self.state.lock();
        if state.ready_state >= ReadyState::HaveMetadata {
            state.width
        } else {
            0
        }
    }

    fn video_height(&self) -> u32 {
        let state = self.state.lock();
        if state.ready_state >= ReadyState::HaveMetadata {
            state.height
        } else {
            0
        }
    }

    fn audio_tracks(&self) -> Vec<NativeAudioTrack> {
        self.state.lock().audio_tracks.clone()
    }

    fn set_audio_track_enabled(&self, id: &str, enabled: bool) {
        let mut state = self.state.lock();
        if let Some(track) = state.audio_tracks.iter_mut().find(|t| t.id == id) {
            track.enabled = enabled;
        }
    }

    fn text_tracks(&self) -> Vec<NativeTextTrack> {
        self.state.lock().text_tracks.clone()
    }

    fn set_text_track_mode(&self, id: &str, mode: TextTrackMode) {
        let mut state = self.state.lock();
        if let Some(track) = state.text_tracks.iter_mut().find(|t| t.id == id) {
            track.mode = mode;
        }
    }

    fn add_text_track(&self, source: &SubtitleSource) -> NativeTextTrack {
        let mut state = self.state.lock();
        state.next_external_id += 1;
        let track = NativeTextTrack {
            id: format!("external-{}", state.next_external_id),
            kind: source.kind,
            label: source.label.clone(),
            language: source.language.clone(),
            mode: TextTrackMode::Disabled,
            external: true,
            mime_type: source.mime_type.clone(),
        };
        state.text_tracks.push(track.clone());
        track
    }

    fn remove_external_text_tracks(&self) {
        self.state.lock().text_tracks.retain(|t| !t.external);
    }

    fn subscribe(&self, listener: SignalListener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.listeners.lock().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }
}

// ============================================================================
// Streaming engine
// ============================================================================

struct EngineState {
    supported: bool,
    live: bool,
    variants: Vec<VariantTrack>,
    text_tracks: Vec<EngineTextTrack>,
    abr_enabled: bool,
    text_visible: bool,
    config: Option<EngineConfig>,
    element: Option<Arc<dyn MediaElement>>,
    attach_failure: Option<EngineError>,
    attach_gate: Option<Arc<Notify>>,
    load_failure: Option<EngineError>,
    destroyed: bool,
}

/// In-memory adaptive-streaming engine
pub struct HeadlessEngine {
    state: Mutex<EngineState>,
    listeners: Mutex<Vec<(SubscriptionId, EngineListener)>>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                supported: true,
                live: false,
                variants: Vec::new(),
                text_tracks: Vec::new(),
                abr_enabled: true,
                text_visible: false,
                config: None,
                element: None,
                attach_failure: None,
                attach_gate: None,
                load_failure: None,
                destroyed: false,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// A typical bitrate ladder: 360p to 1080p in one language
    pub fn with_default_ladder(self) -> Self {
        let ladder = [(360, 640, 800_000), (480, 854, 1_400_000), (720, 1280, 2_800_000), (1080, 1920, 5_000_000)];
        let variants = ladder
            .iter()
            .enumerate()
            .map(|(index, &(height, width, bandwidth))| VariantTrack {
                id: index as u64 + 1,
                active: false,
                bandwidth,
                width: Some(width),
                height: Some(height),
                frame_rate: Some(30.0),
                video_codec: Some("avc1.640028".to_string()),
                audio_codec: Some("mp4a.40.2".to_string()),
                language: "en".to_string(),
                label: None,
                channels: Some(2),
            })
            .collect();
        self.with_variants(variants)
    }

    pub fn with_variants(self, variants: Vec<VariantTrack>) -> Self {
        self.state.lock().variants = variants;
        self
    }

    pub fn with_text_tracks(self, tracks: Vec<EngineTextTrack>) -> Self {
        self.state.lock().text_tracks = tracks;
        self
    }

    /// Report every stream as live
    pub fn live(self) -> Self {
        self.state.lock().live = true;
        self
    }

    /// Report the environment as unable to run the engine
    pub fn unsupported(self) -> Self {
        self.state.lock().supported = false;
        self
    }

    pub fn with_attach_failure(self, err: EngineError) -> Self {
        self.state.lock().attach_failure = Some(err);
        self
    }

    pub fn with_load_failure(self, err: EngineError) -> Self {
        self.state.lock().load_failure = Some(err);
        self
    }

    /// Hold `attach` until the gate is notified
    pub fn with_attach_gate(self, gate: Arc<Notify>) -> Self {
        self.state.lock().attach_gate = Some(gate);
        self
    }

    /// Dispatch a signal to every subscriber
    pub fn signal(&self, signal: EngineSignal) {
        let listeners: Vec<EngineListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&signal);
        }
    }

    /// Let ABR switch to another variant
    pub fn adapt_to(&self, variant_id: u64) {
        if self.activate_variant(variant_id) {
            self.signal(EngineSignal::Adaptation);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Last configuration pushed by the adapter
    pub fn config(&self) -> Option<EngineConfig> {
        self.state.lock().config.clone()
    }

    fn activate_variant(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        if !state.variants.iter().any(|v| v.id == id) {
            return false;
        }
        for variant in state.variants.iter_mut() {
            variant.active = variant.id == id;
        }
        true
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingEngine for HeadlessEngine {
    fn is_supported(&self) -> bool {
        self.state.lock().supported
    }

    async fn attach(&self, element: Arc<dyn MediaElement>) -> std::result::Result<(), EngineError> {
        let gate = self.state.lock().attach_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(err) = state.attach_failure.clone() {
            return Err(err);
        }
        state.element = Some(element);
        Ok(())
    }

    fn configure(&self, config: &EngineConfig) {
        let mut state = self.state.lock();
        state.abr_enabled = config.abr_enabled;
        state.config = Some(config.clone());
    }

    async fn load(&self, url: &str) -> std::result::Result<(), EngineError> {
        let element = {
            let mut state = self.state.lock();
            if let Some(err) = state.load_failure.clone() {
                return Err(err);
            }
            // Start on the best rendition of the first language
            if !state.variants.iter().any(|v| v.active) {
                let language = state.variants.first().map(|v| v.language.clone());
                let start = state
                    .variants
                    .iter()
                    .filter(|v| Some(&v.language) == language.as_ref())
                    .max_by_key(|v| v.bandwidth)
                    .map(|v| v.id);
                if let Some(start) = start {
                    for variant in state.variants.iter_mut() {
                        variant.active = variant.id == start;
                    }
                }
            }
            state.element.clone()
        };

        debug!(url, "Headless engine loading");
        if let Some(element) = element {
            element.set_source(Some(url));
        }
        self.signal(EngineSignal::TracksChanged);
        Ok(())
    }

    async fn destroy(&self) {
        let element = {
            let mut state = self.state.lock();
            state.destroyed = true;
            state.element.take()
        };
        if let Some(element) = element {
            element.set_source(None);
        }
    }

    fn is_live(&self) -> bool {
        self.state.lock().live
    }

    fn variant_tracks(&self) -> Vec<VariantTrack> {
        self.state.lock().variants.clone()
    }

    fn text_tracks(&self) -> Vec<EngineTextTrack> {
        self.state.lock().text_tracks.clone()
    }

    fn select_variant(&self, id: u64, _clear_buffer: bool) {
        if self.activate_variant(id) {
            self.signal(EngineSignal::VariantChanged);
        }
    }

    fn select_audio_language(&self, language: &str) {
        let target = {
            let state = self.state.lock();
            let current_height = state.variants.iter().find(|v| v.active).and_then(|v| v.height);
            let candidates = state.variants.iter().filter(|v| v.language == language);
            candidates
                .max_by_key(|v| (v.height == current_height, v.bandwidth))
                .map(|v| v.id)
        };
        if let Some(id) = target {
            self.select_variant(id, false);
        }
    }

    fn select_text_track(&self, id: u64) {
        {
            let mut state = self.state.lock();
            if !state.text_tracks.iter().any(|t| t.id == id) {
                return;
            }
            for track in state.text_tracks.iter_mut() {
                track.active = track.id == id;
            }
        }
        self.signal(EngineSignal::TextChanged);
    }

    fn set_text_visibility(&self, visible: bool) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.text_visible, visible) != visible
        };
        if changed {
            self.signal(EngineSignal::TextChanged);
        }
    }

    fn is_text_visible(&self) -> bool {
        self.state.lock().text_visible
    }

    fn abr_enabled(&self) -> bool {
        self.state.lock().abr_enabled
    }

    fn set_abr_enabled(&self, enabled: bool) {
        self.state.lock().abr_enabled = enabled;
    }

    fn subscribe(&self, listener: EngineListener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.listeners.lock().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Builds a fresh [`HeadlessEngine`] per adapter, or reports the engine
/// library as missing.
pub struct HeadlessEngineLoader {
    build: Option<Box<dyn Fn() -> HeadlessEngine + Send + Sync>>,
}

impl HeadlessEngineLoader {
    pub fn new(build: impl Fn() -> HeadlessEngine + Send + Sync + 'static) -> Self {
        Self {
            build: Some(Box::new(build)),
        }
    }

    /// Loader for an engine with the default bitrate ladder
    pub fn with_default_ladder() -> Self {
        Self::new(|| HeadlessEngine::new().with_default_ladder())
    }

    /// Loader whose engine library is absent from the build
    pub fn missing() -> Self {
        Self { build: None }
    }
}

impl EngineLoader for HeadlessEngineLoader {
    fn load(&self) -> std::result::Result<Arc<dyn StreamingEngine>, ConstructionError> {
        match &self.build {
            Some(build) => Ok(Arc::new(build())),
            None => Err(ConstructionError::EngineUnavailable(
                "streaming engine library is not bundled".to_string(),
            )),
        }
    }
}
