//! Stream-type classification shared by every adapter

use crate::types::StreamType;
use url::Url;

/// Container extensions played directly by the native primitive
const DIRECT_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "ogv"];

/// Classify a stream from its URL or path.
///
/// Pure and case-insensitive. Query strings and fragments are ignored when
/// looking at the extension.
pub fn detect_stream_type(url: &str) -> StreamType {
    let path = url_path(url).to_lowercase();

    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        return StreamType::Hls;
    }
    if path.ends_with(".mpd") {
        return StreamType::Dash;
    }

    let extension = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext);
    match extension {
        Some(ext) if DIRECT_EXTENSIONS.contains(&ext) => StreamType::Mp4,
        _ => StreamType::Unknown,
    }
}

/// Path component of an absolute URL, or the raw string minus query and
/// fragment for relative paths.
fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
