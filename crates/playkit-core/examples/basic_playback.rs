//! Basic playback example
//!
//! Detects capabilities of a simulated platform, lets the factory pick an
//! adapter for a few stream URLs and drives one of them through a short
//! playback session.
//!
//! Run with: cargo run -p playkit-core --example basic_playback

use playkit_core::backend::SubtitleSource;
use playkit_core::headless::{HeadlessEngineLoader, HeadlessMediaElement, PlatformProfile};
use playkit_core::{
    CapabilityDetector, CreatePlayerOptions, NativeAdapter, PlayerAdapter, PlayerConfig,
    PlayerEvent, PlayerEventKind, PlayerFactory,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> playkit_core::Result<()> {
    println!("Playkit Core - Basic Playback Example");
    println!("=====================================\n");

    let detector = Arc::new(CapabilityDetector::new(Arc::new(PlatformProfile::desktop_browser())));
    let factory = PlayerFactory::new(detector, Arc::new(HeadlessEngineLoader::with_default_ladder()));

    // Capabilities
    let capabilities = factory.capabilities();
    println!("Platform capabilities:");
    println!("  Buffered media:    {}", capabilities.buffered_media);
    println!("  Encrypted media:   {}", capabilities.encrypted_media);
    println!("  Native HLS:        {}", capabilities.native_hls);
    println!("  Video codecs:      {}", capabilities.video_codecs.join(", "));
    println!("  Audio codecs:      {}", capabilities.audio_codecs.join(", "));
    println!();

    // Selection
    println!("Recommended adapters:");
    for url in [
        "https://cdn.example.com/live/master.m3u8",
        "https://cdn.example.com/vod/manifest.mpd",
        "https://cdn.example.com/clips/intro.mp4",
    ] {
        println!("  {:<45} -> {}", url, factory.recommended_player_type(Some(url))?);
    }
    println!();

    // Adaptive session
    let url = "https://cdn.example.com/live/master.m3u8";
    let created = factory
        .create_initialized_player(
            CreatePlayerOptions::for_url(url),
            Arc::new(HeadlessMediaElement::new()),
        )
        .await?;
    let player = created.player;
    println!("Created {} player", created.player_type);

    for kind in [
        PlayerEventKind::StateChange,
        PlayerEventKind::QualityChange,
        PlayerEventKind::TracksLoaded,
    ] {
        player.add_event_listener(kind, Arc::new(print_event));
    }

    player.load(url, true).await?;
    let state = player.state();
    println!("\nQualities:");
    for quality in &state.qualities {
        println!("  {:>6}  {:>5} kbps", quality.label, quality.bitrate / 1000);
    }

    if let Some(lowest) = state.qualities.last() {
        player.set_quality(Some(lowest))?;
    }
    player.set_quality(None)?;
    player.pause()?;
    player.destroy().await;

    // Native session with external subtitles
    println!("\nNative session:");
    let native = NativeAdapter::new();
    native
        .initialize(
            Arc::new(HeadlessMediaElement::new().with_video_size(1920, 1080)),
            PlayerConfig::default(),
        )
        .await?;
    native.load("https://cdn.example.com/clips/intro.mp4", false).await?;
    let track = native.add_subtitle_source(&SubtitleSource::webvtt(
        "https://cdn.example.com/clips/intro.en.vtt",
        "en",
        "English",
    ))?;
    native.set_subtitle_track(Some(&track))?;

    let state = native.state();
    println!("  Duration:  {:.1}s", state.duration);
    println!("  Quality:   {}", state.qualities[0].label);
    println!(
        "  Subtitles: {}",
        state
            .selected_subtitle_track
            .map(|t| t.label)
            .unwrap_or_else(|| "off".to_string())
    );
    native.destroy().await;

    Ok(())
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::StateChange { previous, state } => println!("  [state]   {} -> {}", previous, state),
        PlayerEvent::QualityChange { quality, is_auto } => println!(
            "  [quality] {} (auto: {})",
            quality.as_ref().map_or("none", |q| q.label.as_str()),
            is_auto
        ),
        PlayerEvent::TracksLoaded { qualities, .. } => {
            println!("  [tracks]  {} qualities", qualities.len())
        }
        _ => {}
    }
}
