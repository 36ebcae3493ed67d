//! Integration tests for Playkit Core

use parking_lot::Mutex;
use playkit_core::backend::engine::{EngineError, EngineSignal, Severity};
use playkit_core::backend::{
    BackendError, MediaElement, MediaErrorKind, MediaFailure, MediaSignal, NativeAudioTrack,
};
use playkit_core::headless::{
    HeadlessEngine, HeadlessEngineLoader, HeadlessMediaElement, LoadBehavior, PlatformProfile,
};
use playkit_core::{
    CapabilityDetector, CreatePlayerOptions, Error, ErrorCode, NativeAdapter, PlaybackState,
    PlayerAdapter, PlayerConfig, PlayerEvent, PlayerEventKind, PlayerFactory, PlayerType,
    PlayerTypePreference, StreamType, StreamingAdapter,
};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_test::{assert_pending, assert_ready};

// =============================================================================
// Helpers
// =============================================================================

fn record(adapter: &dyn PlayerAdapter, kinds: &[PlayerEventKind]) -> Arc<Mutex<Vec<PlayerEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let sink = events.clone();
        adapter.add_event_listener(*kind, Arc::new(move |event: &PlayerEvent| sink.lock().push(event.clone())));
    }
    events
}

fn states(events: &[PlayerEvent]) -> Vec<PlaybackState> {
    events
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::StateChange { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

async fn native_with(element: Arc<HeadlessMediaElement>) -> NativeAdapter {
    let adapter = NativeAdapter::new();
    adapter.initialize(element, PlayerConfig::default()).await.unwrap();
    adapter
}

async fn streaming_with(engine: HeadlessEngine, element: Arc<HeadlessMediaElement>) -> StreamingAdapter {
    let adapter = StreamingAdapter::with_engine(Arc::new(engine));
    adapter.initialize(element, PlayerConfig::default()).await.unwrap();
    adapter
}

// =============================================================================
// Contract properties (both adapters)
// =============================================================================

#[tokio::test]
async fn test_state_snapshot_is_a_copy() {
    let native = native_with(Arc::new(HeadlessMediaElement::new())).await;
    let streaming = streaming_with(
        HeadlessEngine::new().with_default_ladder(),
        Arc::new(HeadlessMediaElement::new()),
    )
    .await;

    for adapter in [&native as &dyn PlayerAdapter, &streaming] {
        adapter.load("https://example.com/master.m3u8", false).await.unwrap();

        let mut first = adapter.state();
        let second = adapter.state();
        assert_eq!(first, second);

        first.volume = 0.0;
        first.qualities.clear();
        first.playback_state = PlaybackState::Error;
        let third = adapter.state();
        assert_eq!(third, second);
        assert_ne!(third, first);
    }
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let adapter = NativeAdapter::new();
    assert!(matches!(adapter.pause(), Err(Error::NotInitialized)));
    assert!(matches!(adapter.seek(1.0), Err(Error::NotInitialized)));
    assert!(matches!(adapter.play().await, Err(Error::NotInitialized)));
    assert!(matches!(adapter.load("a.mp4", false).await, Err(Error::NotInitialized)));

    let element = Arc::new(HeadlessMediaElement::new());
    adapter.initialize(element.clone(), PlayerConfig::default()).await.unwrap();
    assert!(matches!(
        adapter.initialize(element.clone(), PlayerConfig::default()).await,
        Err(Error::AlreadyInitialized)
    ));

    adapter.destroy().await;
    assert!(matches!(
        adapter.initialize(element, PlayerConfig::default()).await,
        Err(Error::Destroyed)
    ));
    // Teardown reports NotInitialized for control calls
    assert!(matches!(adapter.set_volume(0.5), Err(Error::NotInitialized)));
    assert!(matches!(adapter.mute(), Err(Error::NotInitialized)));
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let once = native_with(Arc::new(HeadlessMediaElement::new())).await;
    once.load("a.mp4", false).await.unwrap();
    once.destroy().await;

    let element = Arc::new(HeadlessMediaElement::new());
    let many = native_with(element.clone()).await;
    many.load("a.mp4", false).await.unwrap();
    for _ in 0..3 {
        many.destroy().await;
    }

    assert_eq!(once.state(), many.state());
    assert_eq!(many.state().playback_state, PlaybackState::Idle);
    assert_eq!(element.listener_count(), 0);
}

#[tokio::test]
async fn test_seek_clamping() {
    let element = Arc::new(HeadlessMediaElement::new().with_duration(100.0));
    let adapter = native_with(element.clone()).await;
    adapter.load("clip.mp4", false).await.unwrap();

    adapter.seek(-3.0).unwrap();
    assert_eq!(element.current_time(), 0.0);
    adapter.seek(250.0).unwrap();
    assert_eq!(element.current_time(), 100.0);
    adapter.seek(42.5).unwrap();
    assert_eq!(adapter.state().current_time, 42.5);
}

#[tokio::test]
async fn test_seek_on_live_stream_is_noop() {
    let element = Arc::new(HeadlessMediaElement::new().with_duration(f64::INFINITY));
    let adapter = streaming_with(HeadlessEngine::new().with_default_ladder().live(), element.clone()).await;
    adapter.load("https://example.com/live.m3u8", false).await.unwrap();

    let state = adapter.state();
    assert!(state.is_live);
    assert!(!state.is_seekable);

    adapter.seek(30.0).unwrap();
    adapter.seek(-1.0).unwrap();
    assert_eq!(element.current_time(), 0.0);
}

#[tokio::test]
async fn test_volume_clamping() {
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = native_with(element.clone()).await;
    let events = record(&adapter, &[PlayerEventKind::VolumeChange]);

    adapter.set_volume(-0.5).unwrap();
    assert_eq!(adapter.state().volume, 0.0);
    adapter.set_volume(1.5).unwrap();
    assert_eq!(adapter.state().volume, 1.0);
    assert_eq!(element.volume(), 1.0);

    adapter.mute().unwrap();
    assert!(element.muted());
    adapter.unmute().unwrap();
    assert!(!adapter.state().muted);

    // One event per call, none echoed back from the element
    assert_eq!(events.lock().len(), 4);
}

#[tokio::test]
async fn test_listener_removal() {
    let adapter = native_with(Arc::new(HeadlessMediaElement::new())).await;
    let events = Arc::new(Mutex::new(0));
    let counter = events.clone();
    let id = adapter.add_event_listener(
        PlayerEventKind::VolumeChange,
        Arc::new(move |_: &PlayerEvent| *counter.lock() += 1),
    );

    adapter.set_volume(0.3).unwrap();
    assert!(adapter.remove_event_listener(PlayerEventKind::VolumeChange, id));
    adapter.set_volume(0.6).unwrap();
    assert_eq!(*events.lock(), 1);
}

#[tokio::test]
async fn test_listener_panic_is_isolated() {
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = native_with(element).await;
    adapter.add_event_listener(
        PlayerEventKind::StateChange,
        Arc::new(|_: &PlayerEvent| panic!("faulty UI component")),
    );
    let events = record(&adapter, &[PlayerEventKind::StateChange]);

    adapter.load("clip.mp4", false).await.unwrap();
    assert_eq!(
        states(&events.lock()),
        vec![PlaybackState::Loading, PlaybackState::Paused]
    );
}

// =============================================================================
// Native adapter
// =============================================================================

#[tokio::test]
async fn test_native_end_to_end() {
    let element = Arc::new(HeadlessMediaElement::new().with_video_size(1920, 1080));
    let adapter = native_with(element.clone()).await;
    let events = record(
        &adapter,
        &[PlayerEventKind::StateChange, PlayerEventKind::TracksLoaded],
    );

    adapter.load("a.mp4", false).await.unwrap();

    let state = adapter.state();
    assert_eq!(state.qualities.len(), 1);
    assert_eq!(state.qualities[0].id, "native");
    assert_eq!(state.qualities[0].height, 1080);
    assert!(!state.audio_tracks.is_empty());
    assert_eq!(state.playback_state, PlaybackState::Paused);
    assert_eq!(state.stream_type, Some(StreamType::Mp4));
    assert_eq!(state.url.as_deref(), Some("a.mp4"));

    let events = events.lock();
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::TracksLoaded { .. })));
    assert_eq!(states(&events), vec![PlaybackState::Loading, PlaybackState::Paused]);
}

#[tokio::test]
async fn test_native_playback_to_end() {
    let element = Arc::new(HeadlessMediaElement::new().with_duration(10.0));
    let adapter = native_with(element.clone()).await;
    let events = record(&adapter, &[PlayerEventKind::StateChange, PlayerEventKind::Ended]);

    adapter.load("clip.mp4", true).await.unwrap();
    assert_eq!(adapter.state().playback_state, PlaybackState::Playing);

    element.stall();
    assert_eq!(adapter.state().playback_state, PlaybackState::Buffering);
    element.emit(MediaSignal::CanPlay);
    assert_eq!(adapter.state().playback_state, PlaybackState::Playing);

    element.advance(4.0);
    assert_eq!(adapter.state().current_time, 4.0);
    element.advance(10.0);

    assert_eq!(adapter.state().playback_state, PlaybackState::Ended);
    let events = events.lock();
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::Ended)));
    assert_eq!(
        states(&events),
        vec![
            PlaybackState::Loading,
            PlaybackState::Paused,
            PlaybackState::Playing,
            PlaybackState::Buffering,
            PlaybackState::Playing,
            PlaybackState::Ended,
        ]
    );
}

#[tokio::test]
async fn test_metadata_wait_is_single_shot() {
    let element = Arc::new(HeadlessMediaElement::new().with_load_behavior(LoadBehavior::Deferred));
    let adapter = native_with(element.clone()).await;

    let mut load = tokio_test::task::spawn(adapter.load("slow.mp4", false));
    assert_pending!(load.poll());
    assert_eq!(adapter.state().playback_state, PlaybackState::Loading);
    // Core listener plus the pending wait
    assert_eq!(element.listener_count(), 2);

    element.finish_loading();
    assert!(load.is_woken());
    assert_ready!(load.poll()).unwrap();
    drop(load);

    assert_eq!(element.listener_count(), 1);
    assert_eq!(adapter.state().playback_state, PlaybackState::Paused);
}

#[tokio::test]
async fn test_metadata_error_rejects_load() {
    let element = Arc::new(HeadlessMediaElement::new().with_load_behavior(LoadBehavior::Deferred));
    let adapter = native_with(element.clone()).await;
    let errors = record(&adapter, &[PlayerEventKind::Error]);

    let mut load = tokio_test::task::spawn(adapter.load("broken.mp4", false));
    assert_pending!(load.poll());
    element.fail(MediaFailure::new(MediaErrorKind::Network, "connection reset"));
    let err = assert_ready!(load.poll()).unwrap_err();
    drop(load);

    assert!(err.is_recoverable());
    assert_eq!(err.error_code(), "MEDIA_ERROR");
    assert_eq!(adapter.state().playback_state, PlaybackState::Error);
    assert_eq!(errors.lock().len(), 1);
    assert_eq!(element.listener_count(), 1);

    // A reload leaves the error state
    let mut retry = tokio_test::task::spawn(adapter.load("fixed.mp4", false));
    assert_pending!(retry.poll());
    element.finish_loading();
    assert_ready!(retry.poll()).unwrap();
    drop(retry);
    assert!(adapter.state().error.is_none());
}

#[tokio::test]
async fn test_destroy_during_load_is_safe() {
    let element = Arc::new(HeadlessMediaElement::new().with_load_behavior(LoadBehavior::Deferred));
    let adapter = native_with(element.clone()).await;

    let mut load = tokio_test::task::spawn(adapter.load("slow.mp4", false));
    assert_pending!(load.poll());

    let mut destroy = tokio_test::task::spawn(adapter.destroy());
    assert_ready!(destroy.poll());
    drop(destroy);

    // Clearing the source aborted the pending wait; the stale load resolves quietly.
    assert!(load.is_woken());
    assert_ready!(load.poll()).unwrap();
    drop(load);
    assert_eq!(adapter.state().playback_state, PlaybackState::Idle);
}

#[tokio::test]
async fn test_autoplay_refusal_is_recoverable() {
    let element = Arc::new(
        HeadlessMediaElement::new()
            .with_play_refusal(BackendError::NotAllowed("user gesture required".into())),
    );
    let adapter = native_with(element).await;

    let err = adapter.load("clip.mp4", true).await.unwrap_err();
    assert!(err.is_recoverable());
    let state = adapter.state();
    assert_eq!(state.playback_state, PlaybackState::Paused);
    assert_eq!(state.error.map(|e| e.code), Some(ErrorCode::MediaError));
}

#[tokio::test]
async fn test_native_audio_track_change_event() {
    let element = Arc::new(HeadlessMediaElement::new().with_audio_tracks(vec![
        NativeAudioTrack {
            id: "1".into(),
            label: "English".into(),
            language: "en".into(),
            enabled: true,
        },
        NativeAudioTrack {
            id: "2".into(),
            label: "Commentary".into(),
            language: "en".into(),
            enabled: false,
        },
    ]));
    let adapter = native_with(element).await;
    adapter.load("movie.mp4", false).await.unwrap();
    let events = record(&adapter, &[PlayerEventKind::AudioTrackChange]);

    let commentary = adapter.state().audio_tracks[1].clone();
    adapter.set_audio_track(&commentary).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], PlayerEvent::AudioTrackChange { track } if track.id == "2"));
}

// =============================================================================
// Streaming adapter
// =============================================================================

#[tokio::test]
async fn test_streaming_load_and_adaptation() {
    let engine = Arc::new(HeadlessEngine::new().with_default_ladder());
    let adapter = StreamingAdapter::with_engine(engine.clone());
    adapter
        .initialize(Arc::new(HeadlessMediaElement::new()), PlayerConfig::default())
        .await
        .unwrap();
    let events = record(
        &adapter,
        &[PlayerEventKind::TracksLoaded, PlayerEventKind::QualityChange],
    );

    adapter.load("https://example.com/master.m3u8", false).await.unwrap();
    let state = adapter.state();
    let heights: Vec<u32> = state.qualities.iter().map(|q| q.height).collect();
    assert_eq!(heights, vec![1080, 720, 480, 360]);
    assert_eq!(state.stream_type, Some(StreamType::Hls));
    assert!(state.is_auto_quality);

    engine.adapt_to(1);
    engine.adapt_to(1);

    let events = events.lock();
    let tracks_loaded = events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::TracksLoaded { .. }))
        .count();
    assert_eq!(tracks_loaded, 1);
    let quality_changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::QualityChange { quality, is_auto } => Some((quality.clone(), *is_auto)),
            _ => None,
        })
        .collect();
    assert_eq!(quality_changes.len(), 1);
    assert_eq!(quality_changes[0].0.as_ref().map(|q| q.height), Some(360));
    assert!(quality_changes[0].1);
    // Automatic mode keeps no pinned selection
    assert!(adapter.state().selected_quality.is_none());
}

#[tokio::test]
async fn test_streaming_load_failure() {
    let engine = HeadlessEngine::new().with_load_failure(EngineError::new(
        4001,
        Severity::Critical,
        "manifest parse failed",
    ));
    let adapter = streaming_with(engine, Arc::new(HeadlessMediaElement::new())).await;

    let err = adapter.load("https://example.com/bad.mpd", false).await.unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(err.error_code(), "MEDIA_ERROR");
    assert_eq!(adapter.state().playback_state, PlaybackState::Error);
}

#[tokio::test]
async fn test_streaming_buffering_signals() {
    let engine = Arc::new(HeadlessEngine::new().with_default_ladder());
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = StreamingAdapter::with_engine(engine.clone());
    adapter.initialize(element.clone(), PlayerConfig::default()).await.unwrap();
    adapter.load("https://example.com/master.m3u8", true).await.unwrap();
    assert_eq!(adapter.state().playback_state, PlaybackState::Playing);

    engine.signal(EngineSignal::Buffering(true));
    assert_eq!(adapter.state().playback_state, PlaybackState::Buffering);
    engine.signal(EngineSignal::Buffering(false));
    assert_eq!(adapter.state().playback_state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_streaming_engine_config() {
    let engine = Arc::new(HeadlessEngine::new().with_default_ladder());
    let adapter = StreamingAdapter::with_engine(engine.clone());
    adapter
        .initialize(Arc::new(HeadlessMediaElement::new()), PlayerConfig::low_latency())
        .await
        .unwrap();

    let config = engine.config().unwrap();
    assert!(config.low_latency);
    assert_eq!(config.buffering_goal, 6.0);
    assert_eq!(config.retry.max_attempts, 5);
}

#[tokio::test]
async fn test_destroy_during_streaming_initialize() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(HeadlessEngine::new().with_default_ladder().with_attach_gate(gate.clone()));
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = StreamingAdapter::with_engine(engine.clone());
    let config = PlayerConfig {
        volume: 0.3,
        ..Default::default()
    };

    let mut init = tokio_test::task::spawn(adapter.initialize(element.clone(), config));
    assert_pending!(init.poll());

    let mut destroy = tokio_test::task::spawn(adapter.destroy());
    assert_ready!(destroy.poll());
    drop(destroy);

    gate.notify_one();
    assert!(init.is_woken());
    let outcome = assert_ready!(init.poll());
    drop(init);

    assert!(matches!(outcome, Err(Error::Destroyed)));
    assert!(engine.is_destroyed());
    assert_eq!(engine.listener_count(), 0);
    assert_eq!(element.listener_count(), 0);
    assert_eq!(element.volume(), 1.0);
    assert!(matches!(adapter.pause(), Err(Error::NotInitialized)));
}

#[tokio::test]
async fn test_live_flag_survives_duration_change() {
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = streaming_with(HeadlessEngine::new().with_default_ladder().live(), element.clone()).await;
    adapter.load("https://example.com/live.m3u8", false).await.unwrap();
    assert!(adapter.state().is_live);

    element.emit(MediaSignal::DurationChange);
    let state = adapter.state();
    assert!(state.is_live);
    assert!(!state.is_seekable);

    adapter.seek(30.0).unwrap();
    assert_eq!(element.current_time(), 0.0);

    // A fresh load forgets the live flag
    let vod = streaming_with(HeadlessEngine::new().with_default_ladder(), Arc::new(HeadlessMediaElement::new())).await;
    vod.load("https://example.com/vod.m3u8", false).await.unwrap();
    assert!(!vod.state().is_live);
    assert!(vod.state().is_seekable);
}

#[tokio::test]
async fn test_single_buffering_event_per_stall() {
    let engine = Arc::new(HeadlessEngine::new().with_default_ladder());
    let element = Arc::new(HeadlessMediaElement::new());
    let adapter = StreamingAdapter::with_engine(engine.clone());
    adapter.initialize(element.clone(), PlayerConfig::default()).await.unwrap();
    adapter.load("https://example.com/master.m3u8", true).await.unwrap();
    let events = record(&adapter, &[PlayerEventKind::Buffering]);

    element.stall();
    engine.signal(EngineSignal::Buffering(true));
    element.emit(MediaSignal::CanPlay);
    engine.signal(EngineSignal::Buffering(false));

    assert_eq!(
        *events.lock(),
        vec![
            PlayerEvent::Buffering { is_buffering: true },
            PlayerEvent::Buffering { is_buffering: false },
        ]
    );
    assert_eq!(adapter.state().playback_state, PlaybackState::Playing);
}

// =============================================================================
// Factory
// =============================================================================

fn factory(profile: PlatformProfile, loader: HeadlessEngineLoader) -> PlayerFactory {
    PlayerFactory::new(
        Arc::new(CapabilityDetector::new(Arc::new(profile))),
        Arc::new(loader),
    )
}

#[test]
fn test_factory_manifest_routes_to_streaming() {
    let factory = factory(PlatformProfile::desktop_browser(), HeadlessEngineLoader::with_default_ladder());
    let created = factory
        .create_player(CreatePlayerOptions::for_url("https://example.com/manifest.mpd"))
        .unwrap();
    assert_eq!(created.player_type, PlayerType::Streaming);
    assert!(created.capabilities.buffered_media);
    assert!(created.capabilities.adaptive_manifest);
}

#[test]
fn test_factory_direct_file_is_native_everywhere() {
    for profile in [
        PlatformProfile::desktop_browser(),
        PlatformProfile::smart_tv(),
        PlatformProfile::headless(),
    ] {
        let factory = factory(profile, HeadlessEngineLoader::with_default_ladder());
        let created = factory
            .create_player(CreatePlayerOptions::for_url("https://example.com/clip.mp4"))
            .unwrap();
        assert_eq!(created.player_type, PlayerType::Native);
    }
}

#[test]
fn test_factory_fallback_when_engine_missing() {
    let factory = factory(PlatformProfile::desktop_browser(), HeadlessEngineLoader::missing());
    let created = factory
        .create_player(CreatePlayerOptions::for_url("https://example.com/manifest.mpd"))
        .unwrap();
    assert_eq!(created.player_type, PlayerType::Native);

    let err = factory
        .create_player(
            CreatePlayerOptions::for_url("https://example.com/manifest.mpd")
                .with_player_type(PlayerTypePreference::Streaming),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Construction(_)));
}

#[test]
fn test_factory_smart_tv_plays_hls_natively() {
    let factory = factory(PlatformProfile::smart_tv(), HeadlessEngineLoader::with_default_ladder());
    assert_eq!(
        factory.recommended_player_type(Some("https://example.com/live.m3u8")).unwrap(),
        PlayerType::Native
    );

    let desktop = factory_for_desktop();
    assert_eq!(
        desktop.recommended_player_type(Some("https://example.com/live.m3u8")).unwrap(),
        PlayerType::Streaming
    );
}

fn factory_for_desktop() -> PlayerFactory {
    factory(PlatformProfile::desktop_browser(), HeadlessEngineLoader::with_default_ladder())
}

#[test]
fn test_factory_dash_without_buffered_media() {
    let factory = factory(PlatformProfile::headless(), HeadlessEngineLoader::with_default_ladder());
    let err = factory
        .create_player(CreatePlayerOptions::for_url("https://example.com/manifest.mpd"))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedStream { stream_type: StreamType::Dash, .. }));
    assert!(!factory.is_player_type_supported(PlayerType::Native));
}

#[tokio::test]
async fn test_factory_end_to_end() {
    let factory = factory_for_desktop();
    let created = factory
        .create_initialized_player(
            CreatePlayerOptions::for_url("https://example.com/master.m3u8"),
            Arc::new(HeadlessMediaElement::new()),
        )
        .await
        .unwrap();
    assert_eq!(created.player_type, PlayerType::Streaming);

    let player = created.player;
    player.load("https://example.com/master.m3u8", true).await.unwrap();
    let state = player.state();
    assert_eq!(state.playback_state, PlaybackState::Playing);
    assert_eq!(state.qualities.len(), 4);

    player.pause().unwrap();
    assert_eq!(player.state().playback_state, PlaybackState::Paused);
    player.destroy().await;
}
