//! Database Engine
//!
//! Owns the in-memory track arena and playlist list for one open device
//! database. All mutation goes through this type; there is no ambient
//! global state. Tracks are addressed by [`TrackHandle`]; positional
//! indices shift on removal and are only derived for display.

use bridge_traits::volume::VolumeAccess;
use bytes::Bytes;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::device::DeviceInfo;
use crate::error::{LibraryError, Result};
use crate::format::{reader, writer};
use crate::layout;
use crate::models::{
    type_marker_for, Playlist, PlaylistId, Track, TrackFields, TrackHandle, TrackUpdate,
};
use crate::path::to_device_format;
use crate::sanitize::sanitize_text;

/// First persistent id handed out by a fresh database.
const FIRST_PERSISTENT_ID: u64 = 0x1000;

/// Serialized artifacts produced by [`Database::persist`].
///
/// The engine serializes to memory; copying the bytes onto the device is
/// the sync pipeline's separate, separately-fallible step.
#[derive(Debug, Clone)]
pub struct PersistOutput {
    /// Main database image for `Control/MediaDB/Library.mdb`.
    pub database: Bytes,
    /// Secondary index for `Control/MediaDB/Library.idx`; best-effort copy.
    pub index: Bytes,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    track: Option<Track>,
}

/// In-memory model of one device database
#[derive(Debug)]
pub struct Database {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    /// Track list order; the domain of "local index".
    order: Vec<TrackHandle>,
    playlists: Vec<Playlist>,
    next_persistent_id: u64,
}

impl Database {
    /// Create a fresh, empty database for a factory-new device.
    ///
    /// The master playlist carries the device's display name.
    pub fn new(device_name: &str) -> Self {
        let name = {
            let cleaned = sanitize_text(device_name);
            if cleaned.is_empty() {
                "Player".to_string()
            } else {
                cleaned
            }
        };
        info!(name = %name, "Initializing new device database");
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            order: Vec::new(),
            playlists: vec![Playlist::new(name, true)],
            next_persistent_id: FIRST_PERSISTENT_ID,
        }
    }

    /// Parse a database image.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let parsed = reader::parse(bytes)?;

        let mut db = Self {
            slots: Vec::with_capacity(parsed.tracks.len()),
            free_slots: Vec::new(),
            order: Vec::with_capacity(parsed.tracks.len()),
            playlists: Vec::with_capacity(parsed.playlists.len()),
            next_persistent_id: FIRST_PERSISTENT_ID,
        };

        let max_id = parsed
            .tracks
            .iter()
            .map(|t| t.persistent_id)
            .max()
            .unwrap_or(0);
        db.next_persistent_id = parsed.next_persistent_id.max(max_id + 1).max(FIRST_PERSISTENT_ID);

        let handles: Vec<TrackHandle> = parsed
            .tracks
            .into_iter()
            .map(|track| db.alloc(track))
            .collect();

        let mut seen_master = false;
        for parsed_playlist in parsed.playlists {
            let mut is_master = parsed_playlist.is_master;
            if is_master && seen_master {
                warn!(
                    name = %parsed_playlist.name,
                    "Demoting duplicate master playlist"
                );
                is_master = false;
            }
            seen_master |= is_master;

            let mut playlist = Playlist::new(parsed_playlist.name, is_master);
            playlist.is_podcast = parsed_playlist.is_podcast;
            playlist.is_smart = parsed_playlist.is_smart;
            playlist.members = parsed_playlist
                .members
                .iter()
                .filter_map(|&position| handles.get(position as usize).copied())
                .collect();
            db.playlists.push(playlist);
        }

        // Master first; UI and serializer both rely on it.
        if let Some(master_index) = db.playlists.iter().position(|p| p.is_master) {
            db.playlists.swap(0, master_index);
        }

        info!(
            tracks = db.order.len(),
            playlists = db.playlists.len(),
            "Parsed device database"
        );
        Ok(db)
    }

    /// Load the database from a device volume.
    ///
    /// Device identity is read best-effort alongside; a missing SysInfo is
    /// logged, not fatal. A missing or malformed database file is fatal and
    /// leaves no partial state behind.
    pub async fn load(volume: &dyn VolumeAccess) -> Result<(Self, Option<DeviceInfo>)> {
        let db_path = layout::database_path();
        let bytes = volume.read_file(&db_path).await.map_err(|e| {
            if e.is_not_found() {
                LibraryError::Parse(format!("database file missing at {}", db_path.display()))
            } else {
                LibraryError::Bridge(e)
            }
        })?;

        let db = Self::parse(&bytes)?;
        let info = DeviceInfo::read(volume).await;
        Ok((db, info))
    }

    // ------------------------------------------------------------------
    // Track access
    // ------------------------------------------------------------------

    fn alloc(&mut self, track: Track) -> TrackHandle {
        let handle = match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.track = Some(track);
                TrackHandle {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    track: Some(track),
                });
                TrackHandle {
                    slot,
                    generation: 0,
                }
            }
        };
        self.order.push(handle);
        handle
    }

    fn resolve(&self, handle: TrackHandle) -> Option<&Track> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.track.as_ref())
    }

    fn resolve_mut(&mut self, handle: TrackHandle) -> Option<&mut Track> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.track.as_mut())
    }

    /// Look up a live track.
    pub fn track(&self, handle: TrackHandle) -> Option<&Track> {
        self.resolve(handle)
    }

    /// Number of tracks in the database.
    pub fn track_count(&self) -> usize {
        self.order.len()
    }

    /// Tracks in list order.
    pub fn tracks(&self) -> impl Iterator<Item = (TrackHandle, &Track)> + '_ {
        self.order
            .iter()
            .filter_map(|&handle| self.resolve(handle).map(|track| (handle, track)))
    }

    /// Current position of a track in the list.
    ///
    /// Positions shift down when an earlier track is removed; never hold
    /// one across a mutation.
    pub fn local_index(&self, handle: TrackHandle) -> Option<usize> {
        self.resolve(handle)?;
        self.order.iter().position(|&h| h == handle)
    }

    /// Handle of the track currently at `index`.
    pub fn handle_at_index(&self, index: usize) -> Option<TrackHandle> {
        self.order.get(index).copied()
    }

    /// Colon-encoded paths of all transferred content.
    pub fn device_paths(&self) -> HashSet<String> {
        self.tracks()
            .filter_map(|(_, t)| t.device_path.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Track mutation
    // ------------------------------------------------------------------

    /// Register a new track and add it to the master playlist.
    ///
    /// Text fields are sanitized, non-finite technical values replaced by
    /// fixed fallbacks. The returned handle is the only way to address the
    /// track afterwards; its persistent id stays 0 until the next
    /// successful persist.
    pub fn create_track(&mut self, fields: TrackFields) -> TrackHandle {
        let now = chrono::Utc::now().timestamp();
        let track = fields.into_track(now);
        debug!(
            title = %track.title,
            artist = %track.artist,
            "Adding track"
        );
        let handle = self.alloc(track);
        let master = &mut self.playlists[0];
        if !master.members.contains(&handle) {
            master.members.push(handle);
        }
        handle
    }

    /// Bind a created track to its on-device content path.
    ///
    /// `dest_path` is the portable (slash-separated) volume-relative path
    /// the content was written to; it is stored in device encoding. Also
    /// derives the firmware type marker and marks the content transferred.
    pub fn finalize_track(
        &mut self,
        handle: TrackHandle,
        dest_path: &str,
        size_bytes: u64,
    ) -> Result<()> {
        let device_path = to_device_format(dest_path);
        let marker = type_marker_for(dest_path);
        let track = self.resolve_mut(handle).ok_or(LibraryError::TrackNotFound)?;

        track.device_path = Some(device_path);
        track.type_marker = marker;
        track.transferred = true;
        if size_bytes > 0 {
            track.size_bytes = size_bytes;
        }

        debug!(handle = %handle, path = %dest_path, "Finalized track");
        Ok(())
    }

    /// Apply a partial metadata update.
    pub fn update_track(&mut self, handle: TrackHandle, update: TrackUpdate) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let track = self.resolve_mut(handle).ok_or(LibraryError::TrackNotFound)?;

        if let Some(title) = update.title {
            track.title = sanitize_text(&title);
        }
        if let Some(artist) = update.artist {
            track.artist = sanitize_text(&artist);
        }
        if let Some(album) = update.album {
            track.album = sanitize_text(&album);
        }
        if let Some(genre) = update.genre {
            track.genre = sanitize_text(&genre);
        }
        if let Some(track_number) = update.track_number {
            track.track_number = track_number;
        }
        if let Some(year) = update.year {
            track.year = year;
        }
        if let Some(rating) = update.rating {
            track.rating = rating;
        }
        track.time_modified = now;
        Ok(())
    }

    /// Remove a track, cleaning up every playlist membership first.
    ///
    /// Returns the device path of the removed content (if transferred) so
    /// the caller can schedule its physical deletion.
    pub fn remove_track(&mut self, handle: TrackHandle) -> Result<Option<String>> {
        let title = self
            .resolve(handle)
            .ok_or(LibraryError::TrackNotFound)?
            .title
            .clone();

        // Membership cleanup must come first: a serialized playlist member
        // pointing at a missing track corrupts the database on write.
        for playlist in &mut self.playlists {
            let before = playlist.members.len();
            playlist.members.retain(|&h| h != handle);
            if playlist.members.len() != before {
                debug!(playlist = %playlist.name, handle = %handle, "Removed track from playlist");
            }
        }

        self.order.retain(|&h| h != handle);
        let entry = &mut self.slots[handle.slot as usize];
        let removed = entry.track.take();
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(handle.slot);

        info!(title = %title, "Removed track");
        Ok(removed.and_then(|t| t.device_path))
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    /// All playlists; the master playlist is first.
    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    /// Look up a playlist by id.
    pub fn playlist(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// The master playlist.
    pub fn master_playlist(&self) -> &Playlist {
        &self.playlists[0]
    }

    /// Display name of the device (the master playlist's name).
    pub fn device_name(&self) -> &str {
        &self.playlists[0].name
    }

    fn playlist_index(&self, id: PlaylistId) -> Result<usize> {
        self.playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))
    }

    /// Create an empty playlist.
    pub fn create_playlist(&mut self, name: &str) -> Result<PlaylistId> {
        let name = sanitize_text(name);
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        let playlist = Playlist::new(name.clone(), false);
        let id = playlist.id;
        self.playlists.push(playlist);
        info!(name = %name, "Created playlist");
        Ok(id)
    }

    /// Delete a playlist. The master playlist is protected.
    pub fn delete_playlist(&mut self, id: PlaylistId) -> Result<()> {
        let index = self.playlist_index(id)?;
        if self.playlists[index].is_master {
            return Err(LibraryError::MasterPlaylist);
        }
        let playlist = self.playlists.remove(index);
        info!(name = %playlist.name, "Deleted playlist");
        Ok(())
    }

    /// Rename a playlist. The master playlist is protected.
    pub fn rename_playlist(&mut self, id: PlaylistId, name: &str) -> Result<()> {
        let name = sanitize_text(name);
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        let index = self.playlist_index(id)?;
        if self.playlists[index].is_master {
            return Err(LibraryError::MasterPlaylist);
        }
        self.playlists[index].name = name;
        Ok(())
    }

    /// Add a track to a playlist. Adding an existing member is a no-op,
    /// not an error.
    pub fn add_to_playlist(&mut self, id: PlaylistId, handle: TrackHandle) -> Result<()> {
        let index = self.playlist_index(id)?;
        if self.playlists[index].is_master {
            return Err(LibraryError::MasterPlaylist);
        }
        self.resolve(handle).ok_or(LibraryError::TrackNotFound)?;

        let playlist = &mut self.playlists[index];
        if playlist.members.contains(&handle) {
            debug!(playlist = %playlist.name, handle = %handle, "Track already in playlist");
            return Ok(());
        }
        playlist.members.push(handle);
        Ok(())
    }

    /// Remove a track from a playlist.
    pub fn remove_from_playlist(&mut self, id: PlaylistId, handle: TrackHandle) -> Result<()> {
        let index = self.playlist_index(id)?;
        if self.playlists[index].is_master {
            return Err(LibraryError::MasterPlaylist);
        }
        self.resolve(handle).ok_or(LibraryError::TrackNotFound)?;

        let playlist = &mut self.playlists[index];
        let before = playlist.members.len();
        playlist.members.retain(|&h| h != handle);
        if playlist.members.len() == before {
            return Err(LibraryError::NotMember);
        }
        Ok(())
    }

    /// Push a raw member handle into a playlist without validation.
    ///
    /// Bypasses every membership guard; exists so harnesses can simulate a
    /// database that picked up dangling references.
    #[doc(hidden)]
    pub fn insert_member_unchecked(&mut self, id: PlaylistId, handle: TrackHandle) -> Result<()> {
        let index = self.playlist_index(id)?;
        self.playlists[index].members.push(handle);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persist
    // ------------------------------------------------------------------

    /// Pre-write pass: sanitize every text field, drop dangling playlist
    /// members, force smart flags off, and re-assert that the master
    /// playlist covers every track. Idempotent.
    pub fn prepare_for_persist(&mut self) {
        for &handle in &self.order {
            let Some(slot) = self.slots.get_mut(handle.slot as usize) else {
                continue;
            };
            let Some(track) = slot.track.as_mut() else {
                continue;
            };
            track.title = sanitize_text(&track.title);
            track.artist = sanitize_text(&track.artist);
            track.album = sanitize_text(&track.album);
            track.genre = sanitize_text(&track.genre);
            track.file_type_label = sanitize_text(&track.file_type_label);
        }

        let live: HashSet<TrackHandle> = self
            .order
            .iter()
            .copied()
            .filter(|&h| {
                self.slots
                    .get(h.slot as usize)
                    .is_some_and(|s| s.generation == h.generation && s.track.is_some())
            })
            .collect();

        for playlist in &mut self.playlists {
            playlist.name = sanitize_text(&playlist.name);
            if playlist.is_smart {
                debug!(playlist = %playlist.name, "Disabling smart flag before persist");
                playlist.is_smart = false;
            }

            let before = playlist.members.len();
            playlist.members.retain(|h| live.contains(h));
            if playlist.members.len() != before {
                warn!(
                    playlist = %playlist.name,
                    dropped = before - playlist.members.len(),
                    "Dropped dangling playlist members"
                );
            }
        }

        // The master playlist implicitly contains every track.
        let master_members: HashSet<TrackHandle> =
            self.playlists[0].members.iter().copied().collect();
        let missing: Vec<TrackHandle> = self
            .order
            .iter()
            .copied()
            .filter(|h| !master_members.contains(h))
            .collect();
        self.playlists[0].members.extend(missing);
    }

    /// Serialize the database.
    ///
    /// Runs [`prepare_for_persist`](Self::prepare_for_persist), assigns a
    /// persistent id to every track that has none, and produces the
    /// database image plus the secondary index. Engine state is unchanged
    /// on failure except for the (harmless, idempotent) preparation pass.
    pub fn persist(&mut self) -> Result<PersistOutput> {
        self.prepare_for_persist();

        for i in 0..self.order.len() {
            let handle = self.order[i];
            let Some(slot) = self.slots.get_mut(handle.slot as usize) else {
                continue;
            };
            if slot.generation != handle.generation {
                continue;
            }
            let Some(track) = slot.track.as_mut() else {
                continue;
            };
            if track.persistent_id == 0 {
                track.persistent_id = self.next_persistent_id;
                self.next_persistent_id += 1;
            }
        }

        let tracks: Vec<(TrackHandle, &Track)> = self
            .order
            .iter()
            .filter_map(|&h| {
                self.slots
                    .get(h.slot as usize)
                    .filter(|s| s.generation == h.generation)
                    .and_then(|s| s.track.as_ref())
                    .map(|t| (h, t))
            })
            .collect();

        let database = writer::serialize(&tracks, &self.playlists, self.next_persistent_id)?;
        let index = writer::serialize_index(&tracks);

        info!(
            tracks = tracks.len(),
            playlists = self.playlists.len(),
            bytes = database.len(),
            "Serialized device database"
        );

        Ok(PersistOutput { database, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_BITRATE_KBPS, DEFAULT_DURATION_MS, DEFAULT_SAMPLE_RATE_HZ};

    fn fields(title: &str) -> TrackFields {
        TrackFields {
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            genre: "Rock".to_string(),
            duration_ms: 200_000.0,
            bitrate_kbps: 192.0,
            sample_rate_hz: 44_100.0,
            size_bytes: 4_000_000,
            file_type_label: "MP3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_track_joins_master() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));

        assert_eq!(db.track_count(), 1);
        assert!(db.master_playlist().contains(handle));
        assert_eq!(db.track(handle).unwrap().persistent_id, 0);
    }

    #[test]
    fn test_nan_duration_gets_fallback() {
        let mut db = Database::new("Player");
        let handle = db.create_track(TrackFields {
            duration_ms: f64::NAN,
            bitrate_kbps: f64::INFINITY,
            sample_rate_hz: -1.0,
            ..fields("Bad Numbers")
        });

        let track = db.track(handle).unwrap();
        assert_eq!(track.duration_ms, DEFAULT_DURATION_MS);
        assert_eq!(track.bitrate_kbps, DEFAULT_BITRATE_KBPS);
        assert_eq!(track.sample_rate_hz, DEFAULT_SAMPLE_RATE_HZ);
    }

    #[test]
    fn test_finalize_sets_path_and_marker() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        db.finalize_track(handle, "Control/Media/F03/one.mp3", 999)
            .unwrap();

        let track = db.track(handle).unwrap();
        assert_eq!(
            track.device_path.as_deref(),
            Some("Control:Media:F03:one.mp3")
        );
        assert_eq!(track.type_marker, *b"MP3 ");
        assert!(track.transferred);
        assert_eq!(track.size_bytes, 999);
    }

    #[test]
    fn test_finalize_stale_handle_fails() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        db.remove_track(handle).unwrap();

        let err = db.finalize_track(handle, "Control/Media/F00/x.mp3", 1);
        assert!(matches!(err, Err(LibraryError::TrackNotFound)));
    }

    #[test]
    fn test_remove_shifts_local_indices() {
        let mut db = Database::new("Player");
        let first = db.create_track(fields("One"));
        let second = db.create_track(fields("Two"));
        let third = db.create_track(fields("Three"));

        assert_eq!(db.local_index(third), Some(2));
        db.remove_track(first).unwrap();

        // Indices shift down; handles stay stable.
        assert_eq!(db.local_index(second), Some(0));
        assert_eq!(db.local_index(third), Some(1));
        assert_eq!(db.local_index(first), None);
    }

    #[test]
    fn test_handle_does_not_alias_after_slot_reuse() {
        let mut db = Database::new("Player");
        let first = db.create_track(fields("One"));
        db.remove_track(first).unwrap();
        let replacement = db.create_track(fields("Two"));

        // The slot was reused, but the old handle must not resolve to the
        // new track.
        assert_eq!(replacement.slot, first.slot);
        assert!(db.track(first).is_none());
        assert_eq!(db.track(replacement).unwrap().title, "Two");
    }

    #[test]
    fn test_remove_track_cleans_all_playlists() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        let x = db.create_playlist("X").unwrap();
        let y = db.create_playlist("Y").unwrap();
        db.add_to_playlist(x, handle).unwrap();
        db.add_to_playlist(y, handle).unwrap();

        let path = db.remove_track(handle).unwrap();
        assert!(path.is_none());

        assert!(!db.playlist(x).unwrap().contains(handle));
        assert!(!db.playlist(y).unwrap().contains(handle));
        assert!(!db.master_playlist().contains(handle));
    }

    #[test]
    fn test_remove_returns_device_path() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        db.finalize_track(handle, "Control/Media/F00/one.mp3", 1)
            .unwrap();

        let path = db.remove_track(handle).unwrap();
        assert_eq!(path.as_deref(), Some("Control:Media:F00:one.mp3"));
    }

    #[test]
    fn test_add_to_playlist_is_idempotent() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        let id = db.create_playlist("Mix").unwrap();

        db.add_to_playlist(id, handle).unwrap();
        db.add_to_playlist(id, handle).unwrap();
        assert_eq!(db.playlist(id).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_from_playlist_not_member() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        let id = db.create_playlist("Mix").unwrap();

        let err = db.remove_from_playlist(id, handle);
        assert!(matches!(err, Err(LibraryError::NotMember)));
    }

    #[test]
    fn test_master_playlist_guards() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        let master_id = db.master_playlist().id;

        assert!(matches!(
            db.add_to_playlist(master_id, handle),
            Err(LibraryError::MasterPlaylist)
        ));
        assert!(matches!(
            db.remove_from_playlist(master_id, handle),
            Err(LibraryError::MasterPlaylist)
        ));
        assert!(matches!(
            db.delete_playlist(master_id),
            Err(LibraryError::MasterPlaylist)
        ));
        assert!(matches!(
            db.rename_playlist(master_id, "New Name"),
            Err(LibraryError::MasterPlaylist)
        ));
        // Master membership untouched by the rejected calls.
        assert!(db.master_playlist().contains(handle));
    }

    #[test]
    fn test_empty_playlist_name_rejected() {
        let mut db = Database::new("Player");
        let before = db.playlists().len();

        assert!(matches!(
            db.create_playlist(""),
            Err(LibraryError::EmptyName)
        ));
        assert!(matches!(
            db.create_playlist("   "),
            Err(LibraryError::EmptyName)
        ));
        assert_eq!(db.playlists().len(), before);
    }

    #[test]
    fn test_prepare_drops_dangling_members() {
        let mut db = Database::new("Player");
        let handle = db.create_track(fields("One"));
        let id = db.create_playlist("Mix").unwrap();
        db.add_to_playlist(id, handle).unwrap();

        // Simulate a dangling reference from a foreign database.
        let foreign = TrackHandle {
            slot: 900,
            generation: 3,
        };
        db.insert_member_unchecked(id, foreign).unwrap();
        assert_eq!(db.playlist(id).unwrap().len(), 2);

        db.prepare_for_persist();
        assert_eq!(db.playlist(id).unwrap().len(), 1);
        assert!(db.playlist(id).unwrap().contains(handle));

        // Idempotent.
        db.prepare_for_persist();
        assert_eq!(db.playlist(id).unwrap().len(), 1);
    }

    #[test]
    fn test_prepare_forces_smart_off() {
        let mut db = Database::new("Player");
        let id = db.create_playlist("Auto Mix").unwrap();
        let index = db.playlists.iter().position(|p| p.id == id).unwrap();
        db.playlists[index].is_smart = true;

        db.prepare_for_persist();
        assert!(!db.playlist(id).unwrap().is_smart);
    }

    #[test]
    fn test_persist_assigns_ids() {
        let mut db = Database::new("Player");
        let first = db.create_track(fields("One"));
        let second = db.create_track(fields("Two"));
        assert_eq!(db.track(first).unwrap().persistent_id, 0);

        db.persist().unwrap();

        let id_one = db.track(first).unwrap().persistent_id;
        let id_two = db.track(second).unwrap().persistent_id;
        assert_ne!(id_one, 0);
        assert_ne!(id_two, 0);
        assert_ne!(id_one, id_two);

        // Ids survive another persist unchanged.
        db.persist().unwrap();
        assert_eq!(db.track(first).unwrap().persistent_id, id_one);
    }

    #[test]
    fn test_persist_parse_round_trip() {
        let mut db = Database::new("My Player");
        let one = db.create_track(fields("One"));
        let _two = db.create_track(fields("Two"));
        db.finalize_track(one, "Control/Media/F00/one.mp3", 123)
            .unwrap();
        let mix = db.create_playlist("Mix").unwrap();
        db.add_to_playlist(mix, one).unwrap();

        let output = db.persist().unwrap();
        let reloaded = Database::parse(&output.database).unwrap();

        assert_eq!(reloaded.track_count(), 2);
        assert_eq!(reloaded.device_name(), "My Player");
        assert_eq!(reloaded.playlists().len(), 2);

        let (first_handle, first) = reloaded.tracks().next().unwrap();
        assert_eq!(first.title, "One");
        assert_eq!(
            first.device_path.as_deref(),
            Some("Control:Media:F00:one.mp3")
        );
        assert_eq!(first.type_marker, *b"MP3 ");

        let mix = reloaded
            .playlists()
            .iter()
            .find(|p| p.name == "Mix")
            .unwrap();
        assert_eq!(mix.members(), &[first_handle]);
    }

    #[test]
    fn test_parse_rejects_corrupt_payload() {
        let mut db = Database::new("Player");
        db.create_track(fields("One"));
        let output = db.persist().unwrap();

        let mut corrupted = output.database.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        assert!(matches!(
            Database::parse(&corrupted),
            Err(LibraryError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        assert!(matches!(
            Database::parse(b"JUNKJUNKJUNKJUNKJUNKJUNKJUNKJUNKJUNK"),
            Err(LibraryError::Parse(_))
        ));
    }
}
