use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Failed to parse device database: {0}")]
    Parse(String),

    #[error("Failed to serialize device database: {0}")]
    Write(String),

    #[error("Track not found (handle is stale or foreign)")]
    TrackNotFound,

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("The master playlist cannot be modified directly")]
    MasterPlaylist,

    #[error("Playlist name cannot be empty")]
    EmptyName,

    #[error("Track is not a member of the playlist")]
    NotMember,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
