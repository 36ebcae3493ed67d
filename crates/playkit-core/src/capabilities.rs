//! Capability detection
//!
//! Probes the hosting runtime for what it can play:
//! - buffered-media support (the substrate adaptive-streaming engines need)
//! - encrypted-media support
//! - built-in HLS playback in the native primitive
//! - video/audio codec support
//!
//! Probes are relatively expensive and do not change within a session, so
//! [`CapabilityDetector::detect_capabilities`] memoizes its first result. Hosts
//! whose capabilities can change after launch (an external display attached,
//! a codec pack installed) call [`CapabilityDetector::clear_cache`] or give the
//! detector a maximum cache age.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// MIME type the native primitive reports for HLS playlists
pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// Baseline buffered-media type an adaptive manifest engine needs
pub const ADAPTIVE_BASELINE_MIME: &str = "video/mp4; codecs=\"avc1.42E01E,mp4a.40.2\"";

/// Answer of a "can play this type" predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanPlay {
    No,
    Maybe,
    Probably,
}

/// Why a probe could not be answered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The facility does not exist in this environment (e.g. no UI context)
    #[error("probe unavailable: {0}")]
    Unavailable(String),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Host probes queried by the detector
pub trait MediaPlatform: Send + Sync {
    /// A native media primitive can be created
    fn has_media_element(&self) -> Result<bool, ProbeError>;

    /// Buffered media (media source extensions or equivalent) is available
    fn has_buffered_media(&self) -> Result<bool, ProbeError>;

    /// Buffered-media support for a MIME type with codecs
    fn is_type_supported(&self, mime: &str) -> Result<bool, ProbeError>;

    /// The native primitive's own "can play" predicate
    fn can_play_type(&self, mime: &str) -> Result<CanPlay, ProbeError>;

    /// Encrypted-media key system access is exposed
    fn has_key_system_access(&self) -> Result<bool, ProbeError>;
}

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Known codec identifier and the MIME type used to probe it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCandidate {
    pub id: &'static str,
    pub mime: &'static str,
}

pub const VIDEO_CODEC_CANDIDATES: &[CodecCandidate] = &[
    CodecCandidate { id: "h264", mime: "video/mp4; codecs=\"avc1.42E01E\"" },
    CodecCandidate { id: "h264-high", mime: "video/mp4; codecs=\"avc1.640028\"" },
    CodecCandidate { id: "hevc", mime: "video/mp4; codecs=\"hvc1.1.6.L93.B0\"" },
    CodecCandidate { id: "vp8", mime: "video/webm; codecs=\"vp8\"" },
    CodecCandidate { id: "vp9", mime: "video/webm; codecs=\"vp9\"" },
    CodecCandidate { id: "av1", mime: "video/mp4; codecs=\"av01.0.05M.08\"" },
];

pub const AUDIO_CODEC_CANDIDATES: &[CodecCandidate] = &[
    CodecCandidate { id: "aac", mime: "audio/mp4; codecs=\"mp4a.40.2\"" },
    CodecCandidate { id: "he-aac", mime: "audio/mp4; codecs=\"mp4a.40.5\"" },
    CodecCandidate { id: "mp3", mime: "audio/mpeg" },
    CodecCandidate { id: "opus", mime: "audio/webm; codecs=\"opus\"" },
    CodecCandidate { id: "vorbis", mime: "audio/webm; codecs=\"vorbis\"" },
    CodecCandidate { id: "flac", mime: "audio/flac" },
    CodecCandidate { id: "ac3", mime: "audio/mp4; codecs=\"ac-3\"" },
    CodecCandidate { id: "eac3", mime: "audio/mp4; codecs=\"ec-3\"" },
];

/// What the hosting runtime can play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Buffered media is available to streaming engines
    pub buffered_media: bool,
    /// Encrypted media key systems are reachable
    pub encrypted_media: bool,
    /// The native primitive plays HLS by itself
    pub native_hls: bool,
    /// Adaptive manifests (DASH) can be played through buffered media
    pub adaptive_manifest: bool,
    /// A native media primitive exists
    pub native_playback: bool,
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl Capabilities {
    pub fn supports_video_codec(&self, id: &str) -> bool {
        self.video_codecs.iter().any(|c| c.eq_ignore_ascii_case(id))
    }

    pub fn supports_audio_codec(&self, id: &str) -> bool {
        self.audio_codecs.iter().any(|c| c.eq_ignore_ascii_case(id))
    }
}

/// Source of capability snapshots for the selection factory
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    fn clear_cache(&self);
}

/// Memoizing capability detector over a [`MediaPlatform`]
pub struct CapabilityDetector {
    platform: Arc<dyn MediaPlatform>,
    clock: Arc<dyn Clock>,
    /// Cached snapshots older than this are re-probed
    max_age: Option<chrono::Duration>,
    cache: RwLock<Option<Capabilities>>,
}

impl CapabilityDetector {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            clock: Arc::new(SystemClock),
            max_age: None,
            cache: RwLock::new(None),
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Expire cached snapshots after `max_age`
    pub fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Cached capability snapshot, probing on first use
    pub fn detect_capabilities(&self) -> Capabilities {
        let now = self.clock.now();
        if let Some(cached) = self.cache.read().as_ref() {
            let fresh = self
                .max_age
                .map_or(true, |max_age| now - cached.detected_at < max_age);
            if fresh {
                return cached.clone();
            }
        }

        let capabilities = self.probe_all(now);
        info!(
            buffered_media = capabilities.buffered_media,
            encrypted_media = capabilities.encrypted_media,
            native_hls = capabilities.native_hls,
            video_codecs = ?capabilities.video_codecs,
            audio_codecs = ?capabilities.audio_codecs,
            "Capabilities detected"
        );
        *self.cache.write() = Some(capabilities.clone());
        capabilities
    }

    /// Drop the memoized snapshot; the next detection probes again
    pub fn clear_cache(&self) {
        debug!("Capability cache cleared");
        *self.cache.write() = None;
    }

    pub fn supports_buffered_media(&self) -> bool {
        probe_flag("buffered_media", self.platform.has_buffered_media())
    }

    pub fn supports_encrypted_media(&self) -> bool {
        probe_flag("encrypted_media", self.platform.has_key_system_access())
    }

    pub fn supports_native_adaptive_stream(&self) -> bool {
        self.supports_native_playback() && self.can_play(HLS_MIME)
    }

    pub fn supports_native_playback(&self) -> bool {
        probe_flag("media_element", self.platform.has_media_element())
    }

    /// Whether a known video codec identifier is playable
    pub fn supports_video_codec(&self, id: &str) -> bool {
        find_candidate(VIDEO_CODEC_CANDIDATES, id).is_some_and(|c| self.codec_playable(c))
    }

    /// Whether a known audio codec identifier is playable
    pub fn supports_audio_codec(&self, id: &str) -> bool {
        find_candidate(AUDIO_CODEC_CANDIDATES, id).is_some_and(|c| self.codec_playable(c))
    }

    pub fn supported_video_codecs(&self) -> Vec<String> {
        self.filter_candidates(VIDEO_CODEC_CANDIDATES)
    }

    pub fn supported_audio_codecs(&self) -> Vec<String> {
        self.filter_candidates(AUDIO_CODEC_CANDIDATES)
    }

    fn probe_all(&self, now: DateTime<Utc>) -> Capabilities {
        let buffered_media = self.supports_buffered_media();
        let adaptive_manifest = buffered_media
            && probe_flag(
                "adaptive_baseline",
                self.platform.is_type_supported(ADAPTIVE_BASELINE_MIME),
            );

        Capabilities {
            buffered_media,
            encrypted_media: self.supports_encrypted_media(),
            native_hls: self.supports_native_adaptive_stream(),
            adaptive_manifest,
            native_playback: self.supports_native_playback(),
            video_codecs: self.supported_video_codecs(),
            audio_codecs: self.supported_audio_codecs(),
            detected_at: now,
        }
    }

    fn can_play(&self, mime: &str) -> bool {
        match self.platform.can_play_type(mime) {
            Ok(answer) => answer != CanPlay::No,
            Err(err) => {
                debug!(mime, error = %err, "can_play_type probe failed");
                false
            }
        }
    }

    // Either predicate accepting the type counts as support.
    fn codec_playable(&self, candidate: &CodecCandidate) -> bool {
        self.can_play(candidate.mime)
            || probe_flag(candidate.id, self.platform.is_type_supported(candidate.mime))
    }

    fn filter_candidates(&self, candidates: &[CodecCandidate]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| self.codec_playable(c))
            .map(|c| c.id.to_string())
            .collect()
    }
}

impl CapabilityProvider for CapabilityDetector {
    fn capabilities(&self) -> Capabilities {
        self.detect_capabilities()
    }

    fn clear_cache(&self) {
        CapabilityDetector::clear_cache(self)
    }
}

/// Fixed capability snapshot; handy for hosts that know their capabilities
/// up front and for tests.
#[derive(Debug, Clone)]
pub struct StaticCapabilities(pub Capabilities);

impl CapabilityProvider for StaticCapabilities {
    fn capabilities(&self) -> Capabilities {
        self.0.clone()
    }

    fn clear_cache(&self) {}
}

fn find_candidate<'a>(candidates: &'a [CodecCandidate], id: &str) -> Option<&'a CodecCandidate> {
    candidates.iter().find(|c| c.id.eq_ignore_ascii_case(id))
}

fn probe_flag(name: &str, result: Result<bool, ProbeError>) -> bool {
    result.unwrap_or_else(|err| {
        debug!(probe = name, error = %err, "Probe degraded to false");
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPlatform {
        probes: AtomicUsize,
        buffered: bool,
    }

    impl CountingPlatform {
        fn new(buffered: bool) -> Self {
            Self {
                probes: AtomicUsize::new(0),
                buffered,
            }
        }
    }

    impl MediaPlatform for CountingPlatform {
        fn has_media_element(&self) -> Result<bool, ProbeError> {
            Ok(true)
        }

        fn has_buffered_media(&self) -> Result<bool, ProbeError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(self.buffered)
        }

        fn is_type_supported(&self, mime: &str) -> Result<bool, ProbeError> {
            Ok(self.buffered && mime.contains("avc1"))
        }

        fn can_play_type(&self, mime: &str) -> Result<CanPlay, ProbeError> {
            Ok(if mime.starts_with("audio/mpeg") { CanPlay::Probably } else { CanPlay::No })
        }

        fn has_key_system_access(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::Failed("key system query threw".into()))
        }
    }

    struct NoUiPlatform;

    impl MediaPlatform for NoUiPlatform {
        fn has_media_element(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::Unavailable("no document".into()))
        }

        fn has_buffered_media(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::Unavailable("no window".into()))
        }

        fn is_type_supported(&self, _mime: &str) -> Result<bool, ProbeError> {
            Err(ProbeError::Unavailable("no window".into()))
        }

        fn can_play_type(&self, _mime: &str) -> Result<CanPlay, ProbeError> {
            Err(ProbeError::Unavailable("no document".into()))
        }

        fn has_key_system_access(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::Unavailable("no navigator".into()))
        }
    }

    struct FixedClock(RwLock<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.read()
        }
    }

    #[test]
    fn test_detection_is_memoized() {
        let platform = Arc::new(CountingPlatform::new(true));
        let detector = CapabilityDetector::new(platform.clone());

        let first = detector.detect_capabilities();
        let second = detector.detect_capabilities();
        assert_eq!(first, second);
        assert_eq!(platform.probes.load(Ordering::SeqCst), 1);

        detector.clear_cache();
        detector.detect_capabilities();
        assert_eq!(platform.probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_probe_values() {
        let detector = CapabilityDetector::new(Arc::new(CountingPlatform::new(true)));
        let caps = detector.detect_capabilities();
        assert!(caps.buffered_media);
        assert!(caps.adaptive_manifest);
        assert!(caps.native_playback);
        assert!(!caps.native_hls);
        // A failing key-system probe degrades to false
        assert!(!caps.encrypted_media);
        assert!(caps.supports_video_codec("H264"));
        assert!(!caps.supports_video_codec("vp9"));
        assert_eq!(caps.audio_codecs, vec!["mp3".to_string()]);
    }

    #[test]
    fn test_probes_degrade_without_ui_context() {
        let detector = CapabilityDetector::new(Arc::new(NoUiPlatform));
        let caps = detector.detect_capabilities();
        assert!(!caps.buffered_media);
        assert!(!caps.encrypted_media);
        assert!(!caps.native_hls);
        assert!(!caps.adaptive_manifest);
        assert!(!caps.native_playback);
        assert!(caps.video_codecs.is_empty());
        assert!(caps.audio_codecs.is_empty());
        assert!(!detector.supports_audio_codec("aac"));
    }

    #[test]
    fn test_unknown_codec_identifier() {
        let detector = CapabilityDetector::new(Arc::new(CountingPlatform::new(true)));
        assert!(!detector.supports_video_codec("theora"));
        assert!(detector.supports_video_codec("h264"));
    }

    #[test]
    fn test_max_age_expires_cache() {
        let platform = Arc::new(CountingPlatform::new(false));
        let clock = Arc::new(FixedClock(RwLock::new(Utc::now())));
        let detector = CapabilityDetector::new(platform.clone())
            .with_clock(clock.clone())
            .with_max_age(chrono::Duration::minutes(5));

        detector.detect_capabilities();
        *clock.0.write() += chrono::Duration::minutes(1);
        detector.detect_capabilities();
        assert_eq!(platform.probes.load(Ordering::SeqCst), 1);

        *clock.0.write() += chrono::Duration::minutes(10);
        let caps = detector.detect_capabilities();
        assert_eq!(platform.probes.load(Ordering::SeqCst), 2);
        assert_eq!(caps.detected_at, clock.now());
    }
}
