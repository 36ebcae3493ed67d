//! Playkit CLI - Playback adapter probe
//!
//! Features:
//! - Stream classification from a URL
//! - Capability reports for simulated platforms
//! - Adapter recommendations
//! - Headless playback simulation with a live event log

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Playkit CLI - Playback adapter toolkit
#[derive(Parser)]
#[command(name = "playkit")]
#[command(version)]
#[command(about = "Probe stream types, platform capabilities and adapter selection", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a stream URL (hls, dash, mp4, unknown)
    Classify {
        /// Stream URL
        url: String,
    },

    /// Report the capabilities of a platform profile
    Capabilities {
        /// Profile preset (desktop, smart-tv, headless) or path to a JSON profile
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show which adapter automatic selection picks for a URL
    Recommend {
        /// Stream URL
        url: String,

        /// Profile preset or path to a JSON profile
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Play a URL against headless backends and print the event stream
    Simulate {
        /// Stream URL
        url: String,

        /// Profile preset or path to a JSON profile
        #[arg(short, long)]
        profile: Option<String>,

        /// Adapter to use (native, streaming, auto)
        #[arg(long, default_value = "auto")]
        player: String,

        /// Seconds of playback to simulate
        #[arg(short, long, default_value = "5")]
        seconds: u32,

        /// Media duration reported by the element (0 = live)
        #[arg(long, default_value = "10")]
        duration: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let format = output::OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Classify { url } => {
            commands::classify(&url, format)?;
        }
        Commands::Capabilities { profile } => {
            commands::capabilities(profile.as_deref(), format)?;
        }
        Commands::Recommend { url, profile } => {
            commands::recommend(&url, profile.as_deref(), format)?;
        }
        Commands::Simulate {
            url,
            profile,
            player,
            seconds,
            duration,
        } => {
            let player = player.parse().map_err(anyhow::Error::msg)?;
            let options = commands::SimulateOptions {
                player,
                seconds,
                duration,
            };
            commands::simulate(&url, profile.as_deref(), options, format).await?;
        }
    }

    Ok(())
}
