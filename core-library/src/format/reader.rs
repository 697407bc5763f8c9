//! Database parser
//!
//! Strict on structure (magic, version, CRC, chunk framing), lenient on
//! content: string fields are sanitized on the way in, and playlist member
//! positions outside the track range are dropped with a warning rather
//! than failing the whole load.

use tracing::warn;

use super::{
    FLAG_MASTER, FLAG_PODCAST, FLAG_SMART, FORMAT_VERSION, HEADER_LEN, MAGIC, PLAYLIST_TAG,
    TRACK_TAG,
};
use crate::error::{LibraryError, Result};
use crate::models::{MediaKind, Track};
use crate::sanitize::sanitize_lossy;

/// Raw playlist record before handles exist.
pub(crate) struct ParsedPlaylist {
    pub name: String,
    pub is_master: bool,
    pub is_podcast: bool,
    pub is_smart: bool,
    /// Positions into the parsed track order.
    pub members: Vec<u32>,
}

/// Fully parsed database image.
pub(crate) struct ParsedDatabase {
    pub next_persistent_id: u64,
    pub tracks: Vec<Track>,
    pub playlists: Vec<ParsedPlaylist>,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LibraryError::Parse(format!(
                "truncated record: wanted {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(self.u64()? as i64)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        Ok(sanitize_lossy(self.take(len)?))
    }
}

fn parse_track(body: &[u8]) -> Result<Track> {
    let mut c = Cursor::new(body);

    let persistent_id = c.u64()?;
    let track_number = c.u32()?;
    let disc_number = c.u32()?;
    let year = c.u32()?;
    let duration_ms = c.u32()?;
    let bitrate_kbps = c.u32()?;
    let sample_rate_hz = c.u32()?;
    let size_bytes = c.u64()?;
    let play_count = c.u32()?;
    let time_added = c.i64()?;
    let time_modified = c.i64()?;
    let rating = c.u8()?;
    let transferred = c.u8()? != 0;
    let media_kind = MediaKind::from_u8(c.u8()?);
    let has_device_path = c.u8()? != 0;

    let mut type_marker = [0u8; 4];
    type_marker.copy_from_slice(c.take(4)?);

    let title = c.string()?;
    let artist = c.string()?;
    let album = c.string()?;
    let genre = c.string()?;
    let file_type_label = c.string()?;
    let device_path = if has_device_path {
        Some(c.string()?)
    } else {
        None
    };

    Ok(Track {
        persistent_id,
        title,
        artist,
        album,
        genre,
        track_number,
        disc_number,
        year,
        duration_ms,
        bitrate_kbps,
        sample_rate_hz,
        size_bytes,
        file_type_label,
        type_marker,
        device_path,
        transferred,
        rating,
        play_count,
        time_added,
        time_modified,
        media_kind,
    })
}

fn parse_playlist(body: &[u8], track_count: u32) -> Result<ParsedPlaylist> {
    let mut c = Cursor::new(body);

    let flags = c.u8()?;
    c.take(3)?;
    let member_count = c.u32()?;
    let name = c.string()?;

    let mut members = Vec::with_capacity(member_count as usize);
    for _ in 0..member_count {
        let position = c.u32()?;
        if position < track_count {
            members.push(position);
        } else {
            warn!(
                playlist = %name,
                position,
                track_count,
                "Dropping playlist member pointing past the track list"
            );
        }
    }

    Ok(ParsedPlaylist {
        name,
        is_master: flags & FLAG_MASTER != 0,
        is_podcast: flags & FLAG_PODCAST != 0,
        is_smart: flags & FLAG_SMART != 0,
        members,
    })
}

/// Parse a full database image.
pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedDatabase> {
    if bytes.len() < HEADER_LEN {
        return Err(LibraryError::Parse(format!(
            "file too short for header ({} bytes)",
            bytes.len()
        )));
    }

    let mut header = Cursor::new(&bytes[..HEADER_LEN]);
    let magic = header.take(4)?;
    if magic != MAGIC {
        return Err(LibraryError::Parse("bad magic bytes".to_string()));
    }
    let version = header.u16()?;
    if version != FORMAT_VERSION {
        return Err(LibraryError::Parse(format!(
            "unsupported format version {}",
            version
        )));
    }
    let _flags = header.u16()?;
    let track_count = header.u32()?;
    let playlist_count = header.u32()?;
    let next_persistent_id = header.u64()?;
    let expected_crc = header.u32()?;

    let payload = &bytes[HEADER_LEN..];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(LibraryError::Parse(format!(
            "checksum mismatch: header says {:08x}, payload is {:08x}",
            expected_crc, actual_crc
        )));
    }

    let mut tracks = Vec::with_capacity(track_count as usize);
    let mut playlists = Vec::with_capacity(playlist_count as usize);

    let mut c = Cursor::new(payload);
    while c.remaining() > 0 {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(c.take(4)?);
        let body_len = c.u32()? as usize;
        let body = c.take(body_len)?;

        if &tag == TRACK_TAG {
            tracks.push(parse_track(body)?);
        } else if &tag == PLAYLIST_TAG {
            playlists.push(parse_playlist(body, track_count)?);
        } else {
            // Unknown chunk from a newer writer: skip, length framing
            // makes this safe.
            warn!(tag = ?tag, len = body_len, "Skipping unknown chunk");
        }
    }

    if tracks.len() != track_count as usize {
        return Err(LibraryError::Parse(format!(
            "header claims {} tracks, found {}",
            track_count,
            tracks.len()
        )));
    }

    if !playlists.iter().any(|p| p.is_master) {
        return Err(LibraryError::Parse("master playlist missing".to_string()));
    }

    Ok(ParsedDatabase {
        next_persistent_id,
        tracks,
        playlists,
    })
}
