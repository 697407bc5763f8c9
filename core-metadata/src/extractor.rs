//! Audio Tag Extraction
//!
//! Extracts tags and technical properties from in-memory audio content
//! using the `lofty` crate. Supports ID3v2, Vorbis Comments, MP4 tags, and
//! FLAC. Extraction works on the content bytes the pipeline already holds;
//! nothing here touches the device.

use bytes::Bytes;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MetadataError, Result};

/// Tags and properties pulled out of one audio file
#[derive(Debug, Clone, Default)]
pub struct ExtractedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    pub duration_ms: Option<u64>,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    /// Short container label (e.g. "MP3", "FLAC")
    pub container: String,
}

/// Map a probed file type to the short container label the rest of the
/// system works with.
pub fn container_label(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Mpeg => "MP3",
        FileType::Mp4 => "M4A",
        FileType::Aac => "AAC",
        FileType::Flac => "FLAC",
        FileType::Wav => "WAV",
        FileType::Vorbis => "OGG",
        FileType::Opus => "OPUS",
        FileType::Ape => "APE",
        FileType::Aiff => "AIFF",
        FileType::WavPack => "WV",
        FileType::Speex => "SPX",
        FileType::Mpc => "MPC",
        _ => "BIN",
    }
}

/// Audio metadata extractor over in-memory content
pub struct TagExtractor {
    parse_options: ParseOptions,
}

impl TagExtractor {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    /// Extract tags and technical properties from content bytes.
    ///
    /// # Errors
    ///
    /// Fails when the content cannot be probed as any known audio format.
    /// Callers fall back to filename heuristics; this error is never fatal
    /// to them.
    pub fn extract(&self, content: &Bytes) -> Result<ExtractedTags> {
        let tagged_file = Probe::new(std::io::Cursor::new(content.as_ref()))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("probe failed: {}", e)))?
            .read()
            .map_err(|e| MetadataError::CorruptedFile(format!("parse failed: {}", e)))?;

        let file_type = tagged_file.file_type();
        let properties = tagged_file.properties();

        let duration_ms = properties.duration().as_millis() as u64;
        let bitrate_kbps = properties.audio_bitrate();
        let sample_rate_hz = properties.sample_rate();

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        let mut extracted = ExtractedTags {
            duration_ms: (duration_ms > 0).then_some(duration_ms),
            bitrate_kbps,
            sample_rate_hz,
            container: container_label(file_type).to_string(),
            ..Default::default()
        };

        if let Some(tag) = tag {
            extracted.title = tag.title().map(|s| normalize_text(s.as_ref()));
            extracted.artist = tag.artist().map(|s| normalize_text(s.as_ref()));
            extracted.album = tag.album().map(|s| normalize_text(s.as_ref()));
            extracted.genre = tag.genre().map(|s| normalize_text(s.as_ref()));
            extracted.track_number = tag.track();
            extracted.disc_number = tag.disk();
            extracted.year = tag.year();
        } else {
            debug!("No tags in content, technical properties only");
        }

        Ok(extracted)
    }
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize tag text: collapse whitespace, drop control characters.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// SHA-256 of content bytes, hex-encoded. Used for dedup across retries.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
