//! On-Device Directory Layout
//!
//! The device exposes one fixed tree under the volume root:
//!
//! ```text
//! Control/
//!   MediaDB/Library.mdb     main database file
//!   MediaDB/Library.idx     secondary index (optional)
//!   Device/SysInfo          device identity (optional)
//!   Media/F00 .. F49        content buckets
//! ```

use std::path::PathBuf;

pub const CONTROL_DIR: &str = "Control";
pub const MEDIA_DB_DIR: &str = "MediaDB";
pub const DATABASE_FILE: &str = "Library.mdb";
pub const INDEX_FILE: &str = "Library.idx";
pub const DEVICE_DIR: &str = "Device";
pub const SYSINFO_FILE: &str = "SysInfo";
pub const MEDIA_DIR: &str = "Media";

/// Fixed number of content buckets; bounds per-directory entry count.
pub const BUCKET_COUNT: u32 = 50;

/// Volume-relative path of the main database file.
pub fn database_path() -> PathBuf {
    [CONTROL_DIR, MEDIA_DB_DIR, DATABASE_FILE].iter().collect()
}

/// Volume-relative path of the secondary index file.
pub fn index_path() -> PathBuf {
    [CONTROL_DIR, MEDIA_DB_DIR, INDEX_FILE].iter().collect()
}

/// Volume-relative path of the SysInfo identity file.
pub fn sysinfo_path() -> PathBuf {
    [CONTROL_DIR, DEVICE_DIR, SYSINFO_FILE].iter().collect()
}

/// Volume-relative path of the media bucket root.
pub fn media_dir() -> PathBuf {
    [CONTROL_DIR, MEDIA_DIR].iter().collect()
}

/// Zero-padded bucket directory name, e.g. `F07`.
pub fn bucket_name(index: u32) -> String {
    format!("F{:02}", index % BUCKET_COUNT)
}

/// Volume-relative path of one content bucket.
pub fn bucket_dir(index: u32) -> PathBuf {
    media_dir().join(bucket_name(index))
}

/// Directories whose presence identifies a player volume.
pub fn required_dirs() -> [PathBuf; 3] {
    [
        PathBuf::from(CONTROL_DIR),
        [CONTROL_DIR, MEDIA_DB_DIR].iter().collect(),
        media_dir(),
    ]
}
