//! # Core Runtime
//!
//! Shared runtime infrastructure for the player core:
//! - [`events`] - typed event bus over `tokio::sync::broadcast`
//! - [`logging`] - `tracing` subscriber setup with env-filter support

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, DeviceEvent, EventBus, LibraryEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
