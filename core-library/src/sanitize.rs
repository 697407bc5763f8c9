//! UTF-8 Field Sanitizing
//!
//! The device firmware asserts on malformed UTF-8 and embedded NULs in
//! string fields. Fields are cleaned instead of rejected: invalid byte
//! sequences are truncated at the last valid boundary, control characters
//! are stripped. Both operations are idempotent.

/// Clean a string field: drop control characters (including NUL) and trim
/// surrounding whitespace.
pub fn sanitize_text(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().to_string()
}

/// Decode raw bytes into a clean string, truncating at the last valid UTF-8
/// boundary. Never fails; garbage input yields an empty string.
pub fn sanitize_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => sanitize_text(s),
        Err(e) => {
            let valid = std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default();
            sanitize_text(valid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_text_passes_through() {
        assert_eq!(sanitize_text("Back In Black"), "Back In Black");
    }

    #[test]
    fn test_control_chars_stripped() {
        assert_eq!(sanitize_text("AC\0/DC\n"), "AC/DC");
    }

    #[test]
    fn test_invalid_utf8_truncated_at_boundary() {
        // "Hé" followed by a lone continuation byte
        let bytes = [b'H', 0xC3, 0xA9, 0xFF, b'x'];
        assert_eq!(sanitize_lossy(&bytes), "H\u{e9}");
    }

    #[test]
    fn test_pure_garbage_yields_empty() {
        assert_eq!(sanitize_lossy(&[0xFF, 0xFE]), "");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs: [&[u8]; 4] = [
            b"  plain title  ",
            &[0xE2, 0x98, 0x83, 0xFF],
            b"nul\0inside",
            &[0xFF],
        ];
        for bytes in inputs {
            let once = sanitize_lossy(bytes);
            let twice = sanitize_lossy(once.as_bytes());
            assert_eq!(once, twice);
        }
    }
}
