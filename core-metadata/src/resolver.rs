//! Metadata Resolution
//!
//! Combines tag extraction with filename fallbacks into one complete
//! [`ResolvedMetadata`]. Resolution never fails: extraction errors are
//! logged and the deterministic fallback fills every gap, so a resolved
//! value can always be committed as a track.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::extractor::{content_hash, TagExtractor};
use crate::fallback::{
    container_from_name, guess_from_name, FALLBACK_BITRATE_KBPS, FALLBACK_DURATION_MS,
    FALLBACK_SAMPLE_RATE_HZ, UNKNOWN_ALBUM, UNKNOWN_ARTIST,
};

/// Complete metadata for one piece of content.
///
/// Technical values are `f64` because they flow straight into the engine's
/// create-track boundary, which treats non-finite values as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub year: u32,
    pub duration_ms: f64,
    pub bitrate_kbps: f64,
    pub sample_rate_hz: f64,
    /// Short container label ("MP3", "FLAC", ...)
    pub container: String,
    pub size_bytes: u64,
    /// SHA-256 of the content, for dedup across retries
    pub content_hash: String,
}

/// Resolver combining extraction and fallback
pub struct MetadataResolver {
    extractor: TagExtractor,
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self {
            extractor: TagExtractor::new(),
        }
    }

    /// Resolve complete metadata for `content` named `display_name`.
    pub fn resolve(&self, display_name: &str, content: &Bytes) -> ResolvedMetadata {
        let extracted = match self.extractor.extract(content) {
            Ok(tags) => tags,
            Err(e) => {
                warn!(
                    name = display_name,
                    "Tag extraction failed ({}), using filename heuristics", e
                );
                Default::default()
            }
        };

        let guess = guess_from_name(display_name);
        debug!(name = display_name, container = %extracted.container, "Resolved metadata");

        let container = if extracted.container.is_empty() {
            container_from_name(display_name)
        } else {
            extracted.container
        };

        ResolvedMetadata {
            title: extracted
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or(guess.title),
            artist: extracted
                .artist
                .filter(|a| !a.is_empty())
                .or(guess.artist)
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: extracted
                .album
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            genre: extracted.genre.unwrap_or_default(),
            track_number: extracted.track_number.unwrap_or(0),
            disc_number: extracted.disc_number.unwrap_or(0),
            year: extracted.year.unwrap_or(0),
            duration_ms: extracted.duration_ms.unwrap_or(FALLBACK_DURATION_MS) as f64,
            bitrate_kbps: extracted.bitrate_kbps.unwrap_or(FALLBACK_BITRATE_KBPS) as f64,
            sample_rate_hz: extracted
                .sample_rate_hz
                .unwrap_or(FALLBACK_SAMPLE_RATE_HZ) as f64,
            container,
            size_bytes: content.len() as u64,
            content_hash: content_hash(content),
        }
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}
