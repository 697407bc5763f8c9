//! Volume-level load/persist behavior against an in-memory device.

use bridge_desktop::MemoryVolume;
use bridge_traits::volume::VolumeAccess;
use bytes::Bytes;
use core_library::{layout, Database, LibraryError, TrackFields};

fn fields(title: &str, artist: &str) -> TrackFields {
    TrackFields {
        title: title.to_string(),
        artist: artist.to_string(),
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

#[tokio::test]
async fn load_missing_database_is_fatal() {
    let volume = MemoryVolume::with_player_layout("EMPTY");
    let result = Database::load(&volume).await;
    assert!(matches!(result, Err(LibraryError::Parse(_))));
}

#[tokio::test]
async fn load_reads_database_and_sysinfo() {
    let volume = MemoryVolume::with_player_layout("MYPLAYER");

    let mut db = Database::new("My Player");
    db.create_track(fields("One", "A"));
    db.create_track(fields("Two", "B"));
    let output = db.persist().unwrap();

    volume
        .write_file(&layout::database_path(), output.database)
        .await
        .unwrap();
    volume
        .write_file(
            &layout::sysinfo_path(),
            Bytes::from("ModelNumStr: PL450\nSerialNumber: ZQ1\nChecksumType: 0\n"),
        )
        .await
        .unwrap();

    let (loaded, info) = Database::load(&volume).await.unwrap();
    assert_eq!(loaded.track_count(), 2);
    assert_eq!(loaded.device_name(), "My Player");

    let info = info.expect("sysinfo present");
    assert_eq!(info.model_number.as_deref(), Some("PL450"));
    assert!(!info.requires_pairing());
}

#[tokio::test]
async fn load_without_sysinfo_still_succeeds() {
    let volume = MemoryVolume::with_player_layout("MYPLAYER");

    let mut db = Database::new("My Player");
    let output = db.persist().unwrap();
    volume
        .write_file(&layout::database_path(), output.database)
        .await
        .unwrap();

    let (loaded, info) = Database::load(&volume).await.unwrap();
    assert_eq!(loaded.track_count(), 0);
    assert!(info.is_none());
}

#[tokio::test]
async fn load_corrupt_file_preserves_no_state() {
    let volume = MemoryVolume::with_player_layout("MYPLAYER");
    volume
        .write_file(&layout::database_path(), Bytes::from_static(b"not a database"))
        .await
        .unwrap();

    assert!(matches!(
        Database::load(&volume).await,
        Err(LibraryError::Parse(_))
    ));
}

#[test]
fn deleted_track_vanishes_from_all_playlists_after_persist_round_trip() {
    // A track on playlists X and Y is deleted; after persisting and
    // re-parsing, neither playlist references it and the write succeeds.
    let mut db = Database::new("Player");
    let keep = db.create_track(fields("Keep", "A"));
    let doomed = db.create_track(fields("Doomed", "B"));

    let x = db.create_playlist("X").unwrap();
    let y = db.create_playlist("Y").unwrap();
    db.add_to_playlist(x, doomed).unwrap();
    db.add_to_playlist(x, keep).unwrap();
    db.add_to_playlist(y, doomed).unwrap();

    db.remove_track(doomed).unwrap();
    let output = db.persist().unwrap();

    let reloaded = Database::parse(&output.database).unwrap();
    assert_eq!(reloaded.track_count(), 1);
    for name in ["X", "Y"] {
        let playlist = reloaded
            .playlists()
            .iter()
            .find(|p| p.name == name)
            .unwrap();
        for &member in playlist.members() {
            assert_eq!(reloaded.track(member).unwrap().title, "Keep");
        }
    }
}

#[test]
fn index_addressing_is_invalid_across_removals() {
    // Positional indices are a display concern only: removing an earlier
    // track shifts every later index down, so a stored index now points at
    // a different track (or past the end). Handles are the stable identity.
    let mut db = Database::new("Player");
    let _a = db.create_track(fields("A", "1"));
    let b = db.create_track(fields("B", "2"));
    let c = db.create_track(fields("C", "3"));

    let stored_index_of_c = db.local_index(c).unwrap();
    assert_eq!(stored_index_of_c, 2);

    db.remove_track(b).unwrap();

    // The stored index no longer refers to C.
    assert_ne!(db.handle_at_index(stored_index_of_c), Some(c));
    // The handle still does.
    assert_eq!(db.local_index(c), Some(1));
    assert_eq!(db.track(c).unwrap().title, "C");
}
