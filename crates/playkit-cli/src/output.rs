//! Output formatting for CLI

use playkit_core::PlayerEvent;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty-printed JSON document
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// One line per event: JSON objects in json mode, a short summary otherwise
pub fn event_line(event: &PlayerEvent, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    }

    match event {
        PlayerEvent::StateChange { previous, state } => format!("[state]     {} -> {}", previous, state),
        PlayerEvent::TimeUpdate {
            current_time,
            buffered,
        } => format!("[time]      {:.1}s (+{:.1}s buffered)", current_time, buffered),
        PlayerEvent::DurationChange { duration } => format!("[duration]  {}", format_seconds(*duration)),
        PlayerEvent::VolumeChange { volume, muted } => {
            format!("[volume]    {:.0}%{}", volume * 100.0, if *muted { " (muted)" } else { "" })
        }
        PlayerEvent::QualityChange { quality, is_auto } => format!(
            "[quality]   {}{}",
            quality.as_ref().map_or("none", |q| q.label.as_str()),
            if *is_auto { " (auto)" } else { "" }
        ),
        PlayerEvent::AudioTrackChange { track } => format!("[audio]     {} ({})", track.label, track.language),
        PlayerEvent::SubtitleTrackChange { track } => format!(
            "[subtitles] {}",
            track.as_ref().map_or("off", |t| t.label.as_str())
        ),
        PlayerEvent::TracksLoaded {
            qualities,
            audio_tracks,
            subtitle_tracks,
        } => format!(
            "[tracks]    {} qualities, {} audio, {} subtitles",
            qualities.len(),
            audio_tracks.len(),
            subtitle_tracks.len()
        ),
        PlayerEvent::Buffering { is_buffering } => format!("[buffering] {}", is_buffering),
        PlayerEvent::Error { error } => format!(
            "[error]     {} (recoverable: {})",
            error,
            error.recoverable
        ),
        PlayerEvent::Ended => "[ended]".to_string(),
    }
}

pub fn format_seconds(seconds: f64) -> String {
    if seconds.is_infinite() {
        "live".to_string()
    } else {
        format!("{:.1}s", seconds)
    }
}
