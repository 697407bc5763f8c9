//! Binary database format
//!
//! The device understands a single little-endian file:
//!
//! ```text
//! [0..4]   magic            b"PMDB"
//! [4..6]   format version   u16 = 1
//! [6..8]   flags            u16 (reserved, 0)
//! [8..12]  track count      u32
//! [12..16] playlist count   u32
//! [16..24] next persistent id u64
//! [24..28] payload CRC32    u32
//! [28..36] reserved         [u8; 8]
//! ```
//!
//! followed by one chunk per record: a 4-byte tag (`TRK ` / `PLS `) and a
//! u32 body length. Strings are u16-length-prefixed UTF-8. Playlist members
//! are stored as u32 positions into the serialized track order.
//!
//! The optional secondary index file (`PMIX`) maps persistent ids to track
//! positions, sorted by id, so the firmware can binary-search without
//! loading the whole database.

pub(crate) mod reader;
pub(crate) mod writer;

pub(crate) const MAGIC: &[u8; 4] = b"PMDB";
pub(crate) const INDEX_MAGIC: &[u8; 4] = b"PMIX";
pub(crate) const FORMAT_VERSION: u16 = 1;
pub(crate) const HEADER_LEN: usize = 36;

pub(crate) const TRACK_TAG: &[u8; 4] = b"TRK ";
pub(crate) const PLAYLIST_TAG: &[u8; 4] = b"PLS ";

pub(crate) const FLAG_MASTER: u8 = 1 << 0;
pub(crate) const FLAG_PODCAST: u8 = 1 << 1;
pub(crate) const FLAG_SMART: u8 = 1 << 2;
