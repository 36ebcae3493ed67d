//! Playkit Core - Playback Adapter Layer
//!
//! One state machine, one event model and one capability-driven selection
//! strategy over heterogeneous playback backends:
//! - Capability detection (buffered media, encrypted media, built-in HLS, codecs)
//! - A native adapter over the platform media primitive
//! - An adaptive-streaming adapter over a segment-based engine
//! - A factory that picks between them and falls back when it must
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Playkit Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐          ┌──────────────────────────┐         │
//! │  │  Capability  │─────────►│     Selection Factory    │         │
//! │  │   Detector   │          └────────────┬─────────────┘         │
//! │  └──────────────┘                       │                       │
//! │                           ┌─────────────┴─────────────┐         │
//! │                           ▼                           ▼         │
//! │                  ┌────────────────┐         ┌────────────────┐  │
//! │                  │ Native Adapter │         │   Streaming    │  │
//! │                  │                │         │    Adapter     │  │
//! │                  └───────┬────────┘         └───────┬────────┘  │
//! │                          └────────────┬─────────────┘           │
//! │                                ┌──────┴──────┐                  │
//! │                                │  Playback   │──► PlayerEvent   │
//! │                                │    Core     │                  │
//! │                                └──────┬──────┘                  │
//! │                                       │                         │
//! │              MediaElement / StreamingEngine (host backends)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use playkit_core::headless::{HeadlessEngineLoader, HeadlessMediaElement, PlatformProfile};
//! use playkit_core::{CapabilityDetector, CreatePlayerOptions, PlayerFactory};
//! use std::sync::Arc;
//!
//! # async fn run() -> playkit_core::Result<()> {
//! let detector = CapabilityDetector::new(Arc::new(PlatformProfile::desktop_browser()));
//! let factory = PlayerFactory::new(
//!     Arc::new(detector),
//!     Arc::new(HeadlessEngineLoader::with_default_ladder()),
//! );
//!
//! let created = factory
//!     .create_initialized_player(
//!         CreatePlayerOptions::for_url("https://cdn.example.com/master.m3u8"),
//!         Arc::new(HeadlessMediaElement::new()),
//!     )
//!     .await?;
//! created.player.load("https://cdn.example.com/master.m3u8", true).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backend;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod factory;
#[cfg(feature = "headless")]
pub mod headless;
pub mod stream;
pub mod types;

pub use adapter::{EventListener, NativeAdapter, PlaybackCore, PlayerAdapter, StreamingAdapter};
pub use backend::engine::{EngineLoader, StreamingEngine};
pub use backend::MediaElement;
pub use capabilities::{
    Capabilities, CapabilityDetector, CapabilityProvider, MediaPlatform, StaticCapabilities,
};
pub use config::{PlayerConfig, QualityPreference};
pub use error::{ConstructionError, Error, ErrorCode, PlayerError, Result};
pub use factory::{
    select_player_type, CreatePlayerOptions, CreatedPlayer, PlayerFactory, PlayerSupportSummary,
};
pub use stream::detect_stream_type;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Playkit Core initialized");
}
