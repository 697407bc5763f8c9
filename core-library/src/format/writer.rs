//! Database serializer
//!
//! Records are emitted in arena order; playlist members are rewritten from
//! handles to positions in that order. The caller (the engine's `persist`)
//! guarantees every member handle resolves before serialization starts.

use bytes::Bytes;
use std::collections::HashMap;

use super::{
    FLAG_MASTER, FLAG_PODCAST, FLAG_SMART, FORMAT_VERSION, HEADER_LEN, INDEX_MAGIC, MAGIC,
    PLAYLIST_TAG, TRACK_TAG,
};
use crate::error::{LibraryError, Result};
use crate::models::{Playlist, Track, TrackHandle};

fn put_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(LibraryError::Write(format!(
            "string field too long ({} bytes)",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn track_body(track: &Track) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(128);

    body.extend_from_slice(&track.persistent_id.to_le_bytes());
    body.extend_from_slice(&track.track_number.to_le_bytes());
    body.extend_from_slice(&track.disc_number.to_le_bytes());
    body.extend_from_slice(&track.year.to_le_bytes());
    body.extend_from_slice(&track.duration_ms.to_le_bytes());
    body.extend_from_slice(&track.bitrate_kbps.to_le_bytes());
    body.extend_from_slice(&track.sample_rate_hz.to_le_bytes());
    body.extend_from_slice(&track.size_bytes.to_le_bytes());
    body.extend_from_slice(&track.play_count.to_le_bytes());
    body.extend_from_slice(&track.time_added.to_le_bytes());
    body.extend_from_slice(&track.time_modified.to_le_bytes());
    body.push(track.rating);
    body.push(track.transferred as u8);
    body.push(track.media_kind.as_u8());
    body.push(track.device_path.is_some() as u8);
    body.extend_from_slice(&track.type_marker);

    put_string(&mut body, &track.title)?;
    put_string(&mut body, &track.artist)?;
    put_string(&mut body, &track.album)?;
    put_string(&mut body, &track.genre)?;
    put_string(&mut body, &track.file_type_label)?;
    if let Some(path) = &track.device_path {
        put_string(&mut body, path)?;
    }

    Ok(body)
}

fn playlist_body(playlist: &Playlist, positions: &HashMap<TrackHandle, u32>) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(32 + playlist.members().len() * 4);

    let mut flags = 0u8;
    if playlist.is_master {
        flags |= FLAG_MASTER;
    }
    if playlist.is_podcast {
        flags |= FLAG_PODCAST;
    }
    if playlist.is_smart {
        flags |= FLAG_SMART;
    }
    body.push(flags);
    body.extend_from_slice(&[0u8; 3]);

    let members: Vec<u32> = playlist
        .members()
        .iter()
        .filter_map(|h| positions.get(h).copied())
        .collect();

    body.extend_from_slice(&(members.len() as u32).to_le_bytes());
    put_string(&mut body, &playlist.name)?;
    for position in members {
        body.extend_from_slice(&position.to_le_bytes());
    }

    Ok(body)
}

fn put_chunk(payload: &mut Vec<u8>, tag: &[u8; 4], body: Vec<u8>) {
    payload.extend_from_slice(tag);
    payload.extend_from_slice(&(body.len() as u32).to_le_bytes());
    payload.extend_from_slice(&body);
}

/// Serialize the full database image.
pub(crate) fn serialize(
    tracks: &[(TrackHandle, &Track)],
    playlists: &[Playlist],
    next_persistent_id: u64,
) -> Result<Bytes> {
    let positions: HashMap<TrackHandle, u32> = tracks
        .iter()
        .enumerate()
        .map(|(i, (handle, _))| (*handle, i as u32))
        .collect();

    let mut payload = Vec::with_capacity(tracks.len() * 160 + playlists.len() * 64);
    for (_, track) in tracks {
        put_chunk(&mut payload, TRACK_TAG, track_body(track)?);
    }
    for playlist in playlists {
        put_chunk(&mut payload, PLAYLIST_TAG, playlist_body(playlist, &positions)?);
    }

    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(tracks.len() as u32).to_le_bytes());
    out.extend_from_slice(&(playlists.len() as u32).to_le_bytes());
    out.extend_from_slice(&next_persistent_id.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&payload);

    Ok(Bytes::from(out))
}

/// Serialize the secondary index: (persistent id, position) sorted by id.
pub(crate) fn serialize_index(tracks: &[(TrackHandle, &Track)]) -> Bytes {
    let mut entries: Vec<(u64, u32)> = tracks
        .iter()
        .enumerate()
        .map(|(i, (_, track))| (track.persistent_id, i as u32))
        .collect();
    entries.sort_unstable_by_key(|(id, _)| *id);

    let mut out = Vec::with_capacity(10 + entries.len() * 12);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (id, position) in entries {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&position.to_le_bytes());
    }

    Bytes::from(out)
}
