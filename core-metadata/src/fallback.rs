//! Filename-Derived Fallbacks
//!
//! When tag extraction fails or leaves gaps, metadata is derived from the
//! display name: an `Artist - Title` split on the first dash separator,
//! the container from the extension, and fixed technical defaults. The
//! fallback is deterministic, so the pipeline always has complete core
//! fields to commit.

/// Technical defaults substituted when nothing measured a value.
pub const FALLBACK_DURATION_MS: u64 = 180_000;
pub const FALLBACK_BITRATE_KBPS: u32 = 128;
pub const FALLBACK_SAMPLE_RATE_HZ: u32 = 44_100;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Artist/title guess from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGuess {
    pub artist: Option<String>,
    pub title: String,
}

/// Strip the extension from a display name.
fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', ' ']) => stem,
        _ => name,
    }
}

/// Guess artist and title from a display name.
///
/// `"Artist - Title.mp3"` splits into artist and title; anything else
/// becomes the whole title with no artist.
pub fn guess_from_name(display_name: &str) -> NameGuess {
    let stem = stem(display_name);

    match stem.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            NameGuess {
                artist: Some(artist.trim().to_string()),
                title: title.trim().to_string(),
            }
        }
        _ => NameGuess {
            artist: None,
            title: stem.trim().to_string(),
        },
    }
}

/// Container label from the extension, upper-cased; "BIN" when absent.
pub fn container_from_name(display_name: &str) -> String {
    match display_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 4 => ext.to_ascii_uppercase(),
        _ => "BIN".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_split() {
        let guess = guess_from_name("Daft Punk - Harder Better.mp3");
        assert_eq!(guess.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(guess.title, "Harder Better");
    }

    #[test]
    fn test_no_dash_whole_title() {
        let guess = guess_from_name("recording.wav");
        assert_eq!(guess.artist, None);
        assert_eq!(guess.title, "recording");
    }

    #[test]
    fn test_dash_without_spaces_not_split() {
        let guess = guess_from_name("self-titled.flac");
        assert_eq!(guess.artist, None);
        assert_eq!(guess.title, "self-titled");
    }

    #[test]
    fn test_no_extension() {
        let guess = guess_from_name("Artist - Song");
        assert_eq!(guess.artist.as_deref(), Some("Artist"));
        assert_eq!(guess.title, "Song");
    }

    #[test]
    fn test_container_from_name() {
        assert_eq!(container_from_name("a.mp3"), "MP3");
        assert_eq!(container_from_name("a.FLAC"), "FLAC");
        assert_eq!(container_from_name("noext"), "BIN");
    }
}
