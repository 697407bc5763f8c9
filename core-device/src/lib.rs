//! # Device Connection
//!
//! Connection lifecycle for one portable player:
//!
//! - [`ConnectionMonitor`](monitor::ConnectionMonitor) - layout verification,
//!   pairing precondition, non-overlapping reachability probes
//! - [`DeviceSession`](session::DeviceSession) - the state torn down on loss

pub mod error;
pub mod monitor;
pub mod session;

pub use error::{DeviceError, Result};
pub use monitor::{ConnectionMonitor, ConnectionState, MonitorConfig};
pub use session::{DeviceSession, SessionTeardown};
