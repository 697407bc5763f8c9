use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Expected device layout missing: {0}")]
    LayoutMissing(String),

    #[error("Device requires one-time pairing setup before it can be used")]
    PairingRequired,

    #[error("No device connected")]
    NotConnected,

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
