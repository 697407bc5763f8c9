//! Domain models for the on-device library
//!
//! Tracks live in an arena owned by [`Database`](crate::database::Database);
//! everything outside the engine refers to them through [`TrackHandle`], a
//! slot + generation pair that stays valid across removals of other tracks
//! and detects use-after-remove instead of aliasing.

use std::fmt;
use uuid::Uuid;

use crate::sanitize::sanitize_text;

// =============================================================================
// Fallback technical values
// =============================================================================

/// Substituted when a source reports a non-finite or non-positive duration.
pub const DEFAULT_DURATION_MS: u32 = 180_000;
/// Substituted when a source reports a non-finite or non-positive bitrate.
pub const DEFAULT_BITRATE_KBPS: u32 = 128;
/// Substituted when a source reports a non-finite or non-positive sample rate.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;

/// Clamp a technical property to a sane stored value.
///
/// The firmware renders garbage (or divides by zero) on zero or NaN values,
/// so they are replaced rather than rejected.
pub(crate) fn coerce_technical(value: f64, fallback: u32) -> u32 {
    if value.is_finite() && value >= 1.0 && value <= u32::MAX as f64 {
        value as u32
    } else {
        fallback
    }
}

// =============================================================================
// ID Types
// =============================================================================

/// Session-stable reference to a track in the engine's arena.
///
/// A handle resolves as long as its track is alive; after the track is
/// removed the slot's generation advances and the handle goes stale. The
/// positional index of a track ("local index") shifts whenever an earlier
/// track is removed and must never be stored across mutations; store the
/// handle instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// Unique identifier for a playlist within one open database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistId(pub(crate) Uuid);

impl PlaylistId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Track
// =============================================================================

/// Kind of media the firmware should file a track under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    #[default]
    Audio,
    Podcast,
}

impl MediaKind {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            MediaKind::Audio => 0,
            MediaKind::Podcast => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => MediaKind::Podcast,
            _ => MediaKind::Audio,
        }
    }
}

/// One persisted media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Identifier assigned by the serializer; 0 until the database has been
    /// persisted at least once after this track was created.
    pub persistent_id: u64,

    // Metadata
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub year: u32,

    // Technical properties
    pub duration_ms: u32,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub size_bytes: u64,
    /// Container label shown in the UI (e.g. "MP3")
    pub file_type_label: String,
    /// 4-byte marker the firmware uses to recognize the file type without
    /// opening it: extension upper-cased, space-padded.
    pub type_marker: [u8; 4],

    // Device placement
    /// Colon-encoded content path; set by finalize only.
    pub device_path: Option<String>,
    /// Content bytes physically present on the device.
    pub transferred: bool,

    // Usage
    pub rating: u8,
    pub play_count: u32,
    pub time_added: i64,
    pub time_modified: i64,

    pub media_kind: MediaKind,
}

/// Derive the firmware type marker from a file path's extension.
pub fn type_marker_for(path: &str) -> [u8; 4] {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let mut marker = [b' '; 4];
    for (i, b) in ext.bytes().take(4).enumerate() {
        marker[i] = b.to_ascii_uppercase();
    }
    marker
}

/// Input fields for creating a track.
///
/// Technical properties arrive as `f64` because upstream sources (tag
/// parsers, transcoder output, UI forms) can hand over NaN or zero; the
/// engine substitutes fixed fallbacks rather than storing them.
#[derive(Debug, Clone)]
pub struct TrackFields {
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
    pub size_bytes: u64,
    pub file_type_label: String,
    pub media_kind: MediaKind,
}

impl Default for TrackFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            track_number: 0,
            disc_number: 0,
            year: 0,
            duration_ms: DEFAULT_DURATION_MS as f64,
            bitrate_kbps: DEFAULT_BITRATE_KBPS as f64,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ as f64,
            size_bytes: 0,
            file_type_label: String::new(),
            media_kind: MediaKind::Audio,
        }
    }
}

impl TrackFields {
    pub(crate) fn into_track(self, now: i64) -> Track {
        Track {
            persistent_id: 0,
            title: sanitize_text(&self.title),
            artist: sanitize_text(&self.artist),
            album: sanitize_text(&self.album),
            genre: sanitize_text(&self.genre),
            track_number: self.track_number,
            disc_number: self.disc_number,
            year: self.year,
            duration_ms: coerce_technical(self.duration_ms, DEFAULT_DURATION_MS),
            bitrate_kbps: coerce_technical(self.bitrate_kbps, DEFAULT_BITRATE_KBPS),
            sample_rate_hz: coerce_technical(self.sample_rate_hz, DEFAULT_SAMPLE_RATE_HZ),
            size_bytes: self.size_bytes,
            file_type_label: sanitize_text(&self.file_type_label),
            type_marker: [b' '; 4],
            device_path: None,
            transferred: false,
            rating: 0,
            play_count: 0,
            time_added: now,
            time_modified: now,
            media_kind: self.media_kind,
        }
    }
}

/// Partial metadata update for an existing track.
#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<u32>,
    pub rating: Option<u8>,
}

// =============================================================================
// Playlist
// =============================================================================

/// Named ordered set of track references
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    /// Exactly one playlist per database; implicitly contains every track
    /// and cannot be mutated through the public playlist operations.
    pub is_master: bool,
    pub is_podcast: bool,
    /// Smart-rule evaluation is unsupported; forced to `false` before
    /// every persist.
    pub is_smart: bool,
    pub(crate) members: Vec<TrackHandle>,
}

impl Playlist {
    pub(crate) fn new(name: String, is_master: bool) -> Self {
        Self {
            id: PlaylistId::new(),
            name,
            is_master,
            is_podcast: false,
            is_smart: false,
            members: Vec::new(),
        }
    }

    /// Ordered member handles.
    pub fn members(&self) -> &[TrackHandle] {
        &self.members
    }

    pub fn contains(&self, handle: TrackHandle) -> bool {
        self.members.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_technical_passthrough() {
        assert_eq!(coerce_technical(240_000.0, DEFAULT_DURATION_MS), 240_000);
    }

    #[test]
    fn test_coerce_technical_nan() {
        assert_eq!(
            coerce_technical(f64::NAN, DEFAULT_DURATION_MS),
            DEFAULT_DURATION_MS
        );
    }

    #[test]
    fn test_coerce_technical_infinite_and_zero() {
        assert_eq!(
            coerce_technical(f64::INFINITY, DEFAULT_BITRATE_KBPS),
            DEFAULT_BITRATE_KBPS
        );
        assert_eq!(coerce_technical(0.0, DEFAULT_BITRATE_KBPS), DEFAULT_BITRATE_KBPS);
        assert_eq!(
            coerce_technical(-44_100.0, DEFAULT_SAMPLE_RATE_HZ),
            DEFAULT_SAMPLE_RATE_HZ
        );
    }

    #[test]
    fn test_type_marker_short_extension() {
        assert_eq!(type_marker_for("Control/Media/F00/a.mp3"), *b"MP3 ");
    }

    #[test]
    fn test_type_marker_four_chars() {
        assert_eq!(type_marker_for("song.flac"), *b"FLAC");
    }

    #[test]
    fn test_type_marker_no_extension() {
        assert_eq!(type_marker_for("noext"), *b"    ");
    }

    #[test]
    fn test_into_track_sanitizes() {
        let fields = TrackFields {
            title: "  Title\0  ".to_string(),
            duration_ms: f64::NAN,
            ..Default::default()
        };
        let track = fields.into_track(0);
        assert_eq!(track.title, "Title");
        assert_eq!(track.duration_ms, DEFAULT_DURATION_MS);
        assert_eq!(track.persistent_id, 0);
        assert!(!track.transferred);
    }
}
