//! Adapter state core
//!
//! Shared state machine, event bus and lifecycle guards. Concrete adapters
//! hold a `PlaybackCore` behind an `Arc` and route every state mutation
//! through it.
//!
//! No lock is held while the backend is called or listeners run: backends
//! may emit signals synchronously from inside any call, and listeners may
//! call straight back into the adapter.

use super::EventListener;
use crate::backend::{MediaElement, MediaErrorKind, MediaFailure, MediaSignal, SubscriptionId};
use crate::config::PlayerConfig;
use crate::error::{Error, ErrorCode, PlayerError, Result};
use crate::types::{
    ListenerId, PlaybackState, PlayerEvent, PlayerEventKind, PlayerState, PlayerType, StreamType,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

type DetachHook = Box<dyn FnOnce() + Send>;

struct CoreInner {
    state: PlayerState,
    config: PlayerConfig,
    initializing: bool,
    initialized: bool,
    destroyed: bool,
    element: Option<Arc<dyn MediaElement>>,
    detach_hooks: Vec<DetachHook>,
    /// Bumped by every load; continuations of older loads are stale
    load_generation: u64,
    /// The backend reported the current stream as live
    live_hint: bool,
}

impl Default for CoreInner {
    fn default() -> Self {
        Self {
            state: PlayerState::default(),
            config: PlayerConfig::default(),
            initializing: false,
            initialized: false,
            destroyed: false,
            element: None,
            detach_hooks: Vec::new(),
            load_generation: 0,
            live_hint: false,
        }
    }
}

/// Shared lifecycle and event plumbing for one adapter instance
pub struct PlaybackCore {
    player_type: PlayerType,
    inner: Mutex<CoreInner>,
    listeners: Mutex<HashMap<PlayerEventKind, Vec<(ListenerId, EventListener)>>>,
}

impl PlaybackCore {
    pub fn new(player_type: PlayerType) -> Arc<Self> {
        Arc::new(Self {
            player_type,
            inner: Mutex::new(CoreInner::default()),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    // ---- lifecycle ----

    /// Claim the right to initialize.
    ///
    /// Fails with `Destroyed` after teardown and `AlreadyInitialized` when
    /// bound or mid-initialization. Pair a failed initialization with
    /// [`abort_initialize`](Self::abort_initialize).
    pub fn begin_initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(Error::Destroyed);
        }
        if inner.initialized || inner.initializing {
            return Err(Error::AlreadyInitialized);
        }
        inner.initializing = true;
        Ok(())
    }

    /// Release the claim taken by `begin_initialize`
    pub fn abort_initialize(&self) {
        self.inner.lock().initializing = false;
    }

    /// Bind the element: apply initial volume and mute, subscribe to its
    /// signals and mark the core initialized.
    ///
    /// Refuses without touching the element unless an initialization claim
    /// is held. A teardown that lands while binding wins.
    pub fn bind(self: &Arc<Self>, element: Arc<dyn MediaElement>, config: PlayerConfig) -> Result<()> {
        self.check_initializing()?;

        let volume = clamp_volume(config.volume);
        element.set_volume(volume);
        element.set_muted(config.muted);

        let weak_core = Arc::downgrade(self);
        let weak_element: Weak<dyn MediaElement> = Arc::downgrade(&element);
        let subscription = element.subscribe(Arc::new(move |signal: &MediaSignal| {
            if let (Some(core), Some(element)) = (weak_core.upgrade(), weak_element.upgrade()) {
                core.handle_media_signal(element.as_ref(), signal);
            }
        }));

        {
            let mut inner = self.inner.lock();
            if inner.destroyed || !inner.initializing {
                let refused = if inner.destroyed { Error::Destroyed } else { Error::NotInitialized };
                drop(inner);
                element.unsubscribe(subscription);
                return Err(refused);
            }
            inner.state.volume = volume;
            inner.state.muted = config.muted;
            inner.config = config;
            inner.element = Some(element.clone());
            inner.initializing = false;
            inner.initialized = true;
        }
        self.add_detach_hook(unsubscribe_hook(element, subscription));

        info!(player_type = %self.player_type, volume, "Player initialized");
        Ok(())
    }

    /// Fails once the initialization claim is gone (teardown or abort)
    pub fn check_initializing(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.destroyed {
            return Err(Error::Destroyed);
        }
        if !inner.initializing {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    /// Register cleanup that runs exactly once on destroy
    pub fn add_detach_hook(&self, hook: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            drop(inner);
            hook();
            return;
        }
        inner.detach_hooks.push(Box::new(hook));
    }

    /// Guard for control operations, returning the bound element.
    ///
    /// Teardown clears the initialized flag, so calls after `destroy` report
    /// `NotInitialized`.
    pub fn ensure_ready(&self) -> Result<Arc<dyn MediaElement>> {
        let inner = self.inner.lock();
        if !inner.initialized {
            return Err(Error::NotInitialized);
        }
        if inner.destroyed {
            return Err(Error::Destroyed);
        }
        inner.element.clone().ok_or(Error::NotInitialized)
    }

    pub fn is_active(&self) -> bool {
        let inner = self.inner.lock();
        inner.initialized && !inner.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    /// Bound element, if any
    pub fn element(&self) -> Option<Arc<dyn MediaElement>> {
        self.inner.lock().element.clone()
    }

    pub fn config(&self) -> PlayerConfig {
        self.inner.lock().config.clone()
    }

    /// Tear down. Returns true only for the call that actually tore down.
    pub fn destroy(&self) -> bool {
        let hooks = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return false;
            }
            inner.destroyed = true;
            inner.initialized = false;
            inner.initializing = false;
            inner.element = None;
            inner.state = PlayerState::default();
            inner.load_generation += 1;
            inner.live_hint = false;
            std::mem::take(&mut inner.detach_hooks)
        };
        self.listeners.lock().clear();

        for hook in hooks {
            hook();
        }
        info!(player_type = %self.player_type, "Player destroyed");
        true
    }

    // ---- state ----

    /// Owned copy of the current state
    pub fn snapshot(&self) -> PlayerState {
        self.inner.lock().state.clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.inner.lock().state.playback_state
    }

    /// Mutate the state without emitting anything
    pub fn update<R>(&self, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        f(&mut self.inner.lock().state)
    }

    /// Transition the state machine.
    ///
    /// Setting the current state is a no-op. Otherwise exactly one
    /// `statechange` is emitted. Returns whether the state changed.
    pub fn set_playback_state(&self, next: PlaybackState) -> bool {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state.playback_state;
            if previous == next {
                return false;
            }
            if !previous.can_transition_to(next) {
                debug!(from = %previous, to = %next, "Ignoring invalid state transition");
                return false;
            }
            inner.state.playback_state = next;
            previous
        };

        debug!(from = %previous, to = %next, "State transition");
        self.emit(PlayerEvent::StateChange {
            previous,
            state: next,
        });
        true
    }

    /// Start a load: clear the previous error and tracks, record the stream
    /// and enter `loading`. Returns the load generation.
    pub fn begin_load(&self, url: &str, stream_type: StreamType) -> u64 {
        let generation = {
            let mut inner = self.inner.lock();
            inner.load_generation += 1;
            inner.live_hint = false;
            let state = &mut inner.state;
            state.error = None;
            state.url = Some(url.to_string());
            state.stream_type = Some(stream_type);
            state.current_time = 0.0;
            state.buffered = 0.0;
            state.qualities.clear();
            state.selected_quality = None;
            state.audio_tracks.clear();
            state.selected_audio_track = None;
            state.subtitle_tracks.clear();
            state.selected_subtitle_track = None;
            inner.load_generation
        };
        info!(url, %stream_type, player_type = %self.player_type, "Loading stream");
        self.set_playback_state(PlaybackState::Loading);
        generation
    }

    /// Whether a load continuation may still touch state
    pub fn is_current_load(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.initialized && !inner.destroyed && inner.load_generation == generation
    }

    /// Record a fatal error: store it, enter `error` and emit it
    pub fn set_error(&self, err: PlayerError) {
        warn!(code = %err.code, recoverable = err.recoverable, message = %err.message, "Playback error");
        self.update(|state| state.error = Some(err.clone()));
        self.set_playback_state(PlaybackState::Error);
        self.emit(PlayerEvent::Error { error: err });
    }

    /// Record and emit an error without leaving the current state
    pub fn notify_error(&self, err: PlayerError) {
        warn!(code = %err.code, recoverable = err.recoverable, message = %err.message, "Playback warning");
        self.update(|state| state.error = Some(err.clone()));
        self.emit(PlayerEvent::Error { error: err });
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    /// Apply an element duration: NaN means unknown, infinite means live.
    /// A stream marked with [`mark_live`](Self::mark_live) stays live and
    /// unseekable whatever the duration. Emits `durationchange` when the
    /// value changed.
    pub fn apply_duration(&self, raw: f64) {
        let duration = if raw.is_nan() { 0.0 } else { raw };
        let changed = {
            let mut inner = self.inner.lock();
            let live_hint = inner.live_hint;
            let state = &mut inner.state;
            let changed = state.duration != duration;
            state.duration = duration;
            state.is_live = live_hint || duration.is_infinite();
            state.is_seekable = !state.is_live && duration.is_finite() && duration > 0.0;
            changed
        };
        if changed {
            self.emit(PlayerEvent::DurationChange { duration });
        }
    }

    /// Mark the current stream live until the next load
    pub fn mark_live(&self) {
        let mut inner = self.inner.lock();
        inner.live_hint = true;
        inner.state.is_live = true;
        inner.state.is_seekable = false;
    }

    // ---- events ----

    pub fn add_listener(&self, kind: PlayerEventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove_listener(&self, kind: PlayerEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(listener_id, _)| *listener_id != id);
        registered.len() != before
    }

    /// Deliver an event to every listener of its kind.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn emit(&self, event: PlayerEvent) {
        let kind = event.kind();
        let listeners: Vec<(ListenerId, EventListener)> = self
            .listeners
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for (id, listener) in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if outcome.is_err() {
                error!(listener = %id, event = ?kind, "Event listener panicked");
            }
        }
    }

    // ---- transport shared by every adapter ----

    pub async fn play(&self) -> Result<()> {
        let element = self.ensure_ready()?;
        if let Err(err) = element.play().await {
            let err = PlayerError::media(format!("play request failed: {}", err), true).with_cause(err);
            self.notify_error(err.clone());
            return Err(err.into());
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let element = self.ensure_ready()?;
        element.pause();
        Ok(())
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        let element = self.ensure_ready()?;
        let (seekable, duration) = {
            let inner = self.inner.lock();
            (inner.state.is_seekable, inner.state.duration)
        };
        if !seekable || !duration.is_finite() {
            debug!(seconds, "Ignoring seek on unseekable stream");
            return Ok(());
        }

        let target = if seconds.is_nan() { 0.0 } else { seconds.clamp(0.0, duration) };
        debug!(from = seconds, to = target, "Seeking");
        self.update(|state| state.current_time = target);
        element.set_current_time(target);
        Ok(())
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        let element = self.ensure_ready()?;
        let volume = clamp_volume(volume);
        let muted = self.update(|state| {
            state.volume = volume;
            state.muted
        });
        element.set_volume(volume);
        self.emit(PlayerEvent::VolumeChange { volume, muted });
        Ok(())
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        let element = self.ensure_ready()?;
        let volume = self.update(|state| {
            state.muted = muted;
            state.volume
        });
        element.set_muted(muted);
        self.emit(PlayerEvent::VolumeChange { volume, muted });
        Ok(())
    }

    // ---- media element signals ----

    fn handle_media_signal(&self, element: &dyn MediaElement, signal: &MediaSignal) {
        if !self.is_active() {
            return;
        }
        let current = self.playback_state();
        // The load path owns state until the stream is ready.
        let loading = matches!(current, PlaybackState::Idle | PlaybackState::Loading);

        match signal {
            MediaSignal::LoadedMetadata | MediaSignal::DurationChange => {
                self.apply_duration(element.duration());
            }
            MediaSignal::CanPlay => {
                if current == PlaybackState::Buffering {
                    self.emit(PlayerEvent::Buffering { is_buffering: false });
                    self.set_playback_state(if element.is_paused() {
                        PlaybackState::Paused
                    } else {
                        PlaybackState::Playing
                    });
                }
            }
            MediaSignal::Playing if !loading => {
                if current == PlaybackState::Buffering {
                    self.emit(PlayerEvent::Buffering { is_buffering: false });
                }
                self.set_playback_state(PlaybackState::Playing);
            }
            MediaSignal::Pause if !loading => {
                // Reaching the end pauses first; `Ended` follows.
                if current != PlaybackState::Ended && !at_end(element) {
                    self.set_playback_state(PlaybackState::Paused);
                }
            }
            MediaSignal::Waiting if !loading => {
                if self.set_playback_state(PlaybackState::Buffering) {
                    self.emit(PlayerEvent::Buffering { is_buffering: true });
                }
            }
            MediaSignal::TimeUpdate | MediaSignal::Progress => {
                let current_time = element.current_time();
                let buffered = (element.buffered_end() - current_time).max(0.0);
                self.update(|state| {
                    state.current_time = current_time;
                    state.buffered = buffered;
                });
                self.emit(PlayerEvent::TimeUpdate {
                    current_time,
                    buffered,
                });
            }
            MediaSignal::VolumeChange => {
                let volume = element.volume();
                let muted = element.muted();
                let changed = self.update(|state| {
                    let changed = state.volume != volume || state.muted != muted;
                    state.volume = volume;
                    state.muted = muted;
                    changed
                });
                if changed {
                    self.emit(PlayerEvent::VolumeChange { volume, muted });
                }
            }
            MediaSignal::Ended => {
                if self.set_playback_state(PlaybackState::Ended) {
                    self.emit(PlayerEvent::Ended);
                }
            }
            MediaSignal::Error(failure) if !loading => {
                self.set_error(classify_media_failure(failure));
            }
            _ => {}
        }
    }
}

/// Map a media element failure into the shared taxonomy
pub fn classify_media_failure(failure: &MediaFailure) -> PlayerError {
    let (code, recoverable) = match failure.kind {
        MediaErrorKind::Aborted => (ErrorCode::Unknown, true),
        MediaErrorKind::Network => (ErrorCode::NetworkError, true),
        MediaErrorKind::Decode => (ErrorCode::MediaError, false),
        MediaErrorKind::SrcNotSupported => (ErrorCode::SrcNotSupported, false),
    };
    PlayerError::new(code, failure.message.clone(), recoverable).with_cause(failure.clone())
}

fn at_end(element: &dyn MediaElement) -> bool {
    let duration = element.duration();
    duration.is_finite() && duration > 0.0 && element.current_time() >= duration
}

fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

fn unsubscribe_hook(element: Arc<dyn MediaElement>, id: SubscriptionId) -> impl FnOnce() + Send {
    move || element.unsubscribe(id)
}
