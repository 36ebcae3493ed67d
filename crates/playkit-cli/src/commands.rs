//! CLI command implementations

use crate::output::{event_line, format_seconds, to_json, OutputFormat};
use anyhow::Context;
use playkit_core::headless::{HeadlessEngineLoader, HeadlessMediaElement, PlatformProfile};
use playkit_core::{
    detect_stream_type, CapabilityDetector, CreatePlayerOptions, PlayerEvent, PlayerEventKind,
    PlayerFactory, PlayerTypePreference,
};
use serde_json::json;
use std::sync::Arc;

/// Resolve a profile preset name or a JSON profile file
pub fn load_profile(profile: Option<&str>) -> anyhow::Result<PlatformProfile> {
    let profile = match profile {
        None | Some("desktop") => PlatformProfile::desktop_browser(),
        Some("smart-tv") | Some("tv") => PlatformProfile::smart_tv(),
        Some("headless") => PlatformProfile::headless(),
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read profile {}", path))?;
            PlatformProfile::from_json(&json).with_context(|| format!("invalid profile {}", path))?
        }
    };
    Ok(profile)
}

fn factory_for(profile: PlatformProfile) -> PlayerFactory {
    PlayerFactory::new(
        Arc::new(CapabilityDetector::new(Arc::new(profile))),
        Arc::new(HeadlessEngineLoader::with_default_ladder()),
    )
}

/// Classify a stream URL
pub fn classify(url: &str, format: OutputFormat) -> anyhow::Result<()> {
    let stream_type = detect_stream_type(url);
    match format {
        OutputFormat::Json => println!("{}", to_json(&json!({ "url": url, "stream_type": stream_type }))?),
        OutputFormat::Text => println!("{}: {}", url, stream_type),
    }
    Ok(())
}

/// Report capabilities of a platform profile
pub fn capabilities(profile: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let profile = load_profile(profile)?;
    let name = profile.name.clone();
    let factory = factory_for(profile);
    let capabilities = factory.capabilities();
    let summary = factory.player_support_summary();

    if format == OutputFormat::Json {
        println!(
            "{}",
            to_json(&json!({
                "profile": name,
                "capabilities": capabilities,
                "support": summary,
            }))?
        );
        return Ok(());
    }

    println!("Platform: {}", name);
    println!("\nCapabilities:");
    println!("  Native playback:    {}", capabilities.native_playback);
    println!("  Buffered media:     {}", capabilities.buffered_media);
    println!("  Encrypted media:    {}", capabilities.encrypted_media);
    println!("  Native HLS:         {}", capabilities.native_hls);
    println!("  Adaptive manifests: {}", capabilities.adaptive_manifest);
    println!("  Video codecs:       {}", list_or_none(&capabilities.video_codecs));
    println!("  Audio codecs:       {}", list_or_none(&capabilities.audio_codecs));
    println!("\nAdapters:");
    println!("  Native:             {}", supported(summary.native));
    println!("  Streaming:          {}", supported(summary.streaming));
    println!("  Recommended:        {}", summary.recommended);
    Ok(())
}

/// Show the adapter automatic selection picks
pub fn recommend(url: &str, profile: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let profile = load_profile(profile)?;
    let name = profile.name.clone();
    let factory = factory_for(profile);
    let stream_type = detect_stream_type(url);
    let player_type = factory.recommended_player_type(Some(url))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            to_json(&json!({
                "url": url,
                "profile": name,
                "stream_type": stream_type,
                "player_type": player_type,
            }))?
        ),
        OutputFormat::Text => println!("{} ({}) on {}: {} player", url, stream_type, name, player_type),
    }
    Ok(())
}

/// Settings for a simulated session
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub player: PlayerTypePreference,
    pub seconds: u32,
    /// Media duration in seconds; 0 simulates a live stream
    pub duration: f64,
}

/// Play a URL against headless backends, printing every event
pub async fn simulate(
    url: &str,
    profile: Option<&str>,
    options: SimulateOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let factory = factory_for(load_profile(profile)?);
    let duration = if options.duration > 0.0 {
        options.duration
    } else {
        f64::INFINITY
    };
    let element = Arc::new(HeadlessMediaElement::new().with_duration(duration));

    let created = factory
        .create_initialized_player(
            CreatePlayerOptions::for_url(url).with_player_type(options.player),
            element.clone(),
        )
        .await
        .context("failed to create player")?;

    if format == OutputFormat::Text {
        println!("Simulating {} with the {} player", url, created.player_type);
        if let Some(reason) = &created.fallback_reason {
            println!("  (fell back to native: {})", reason);
        }
        println!();
    }

    let player = created.player;
    for kind in PlayerEventKind::ALL {
        player.add_event_listener(
            kind,
            Arc::new(move |event: &PlayerEvent| println!("{}", event_line(event, format))),
        );
    }

    player.load(url, true).await.context("load failed")?;
    for _ in 0..options.seconds {
        if player.state().playback_state == playkit_core::PlaybackState::Ended {
            break;
        }
        element.advance(1.0);
    }
    player.pause()?;

    let state = player.state();
    if format == OutputFormat::Text {
        println!("\nFinal state:");
        println!("  State:    {}", state.playback_state);
        println!("  Position: {:.1}s / {}", state.current_time, format_seconds(state.duration));
        println!(
            "  Quality:  {}",
            state
                .selected_quality
                .as_ref()
                .map_or_else(|| "auto".to_string(), |q| q.label.clone())
        );
    }

    player.destroy().await;
    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn supported(flag: bool) -> &'static str {
    if flag {
        "supported"
    } else {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        assert!(load_profile(None).unwrap().buffered_media);
        assert!(load_profile(Some("smart-tv")).unwrap().native_hls);
        assert!(!load_profile(Some("headless")).unwrap().ui_context);
        assert!(load_profile(Some("/nonexistent/profile.json")).is_err());
    }

    #[tokio::test]
    async fn test_simulate_runs_to_end() {
        let options = SimulateOptions {
            player: PlayerTypePreference::Auto,
            seconds: 3,
            duration: 2.0,
        };
        simulate("https://example.com/clip.mp4", None, options, OutputFormat::Json)
            .await
            .unwrap();
    }
}
