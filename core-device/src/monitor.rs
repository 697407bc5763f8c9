//! # Connection Monitor
//!
//! Tracks device reachability:
//!
//! ```text
//! Disconnected → Connecting → Connected → Disconnected
//!                    ↓
//!             WaitingForPairing (one-time setup incomplete)
//! ```
//!
//! Connecting verifies the fixed directory layout and, for device models
//! that demand it, the presence of the pairing identifier. While
//! connected, a periodic probe re-resolves the layout; a single probe is
//! in flight at a time (busy flag), and it runs independently of any sync
//! session; a disconnect mid-sync fails that sync's next I/O call but
//! never corrupts engine state.

use bridge_traits::volume::VolumeAccess;
use core_library::{layout, Database, DeviceInfo};
use core_runtime::events::{CoreEvent, DeviceEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};
use crate::session::SessionTeardown;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Layout verified but the one-time pairing setup has not run; waiting
    /// for external completion.
    WaitingForPairing,
    Connected,
}

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between reachability probes.
    pub probe_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
        }
    }
}

/// Device reachability monitor
pub struct ConnectionMonitor {
    config: MonitorConfig,
    events: EventBus,
    teardown: Arc<dyn SessionTeardown>,
    volume: Mutex<Option<Arc<dyn VolumeAccess>>>,
    state: Mutex<ConnectionState>,
    /// Guards against overlapping probes.
    probe_busy: AtomicBool,
}

impl ConnectionMonitor {
    pub fn new(
        config: MonitorConfig,
        teardown: Arc<dyn SessionTeardown>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            events,
            teardown,
            volume: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            probe_busy: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Currently connected volume, if any.
    pub async fn volume(&self) -> Option<Arc<dyn VolumeAccess>> {
        self.volume.lock().await.clone()
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.lock().await = state;
    }

    /// Verify the fixed directory layout resolves on the volume.
    async fn verify_layout(volume: &dyn VolumeAccess) -> Result<()> {
        for dir in layout::required_dirs() {
            let present = volume.exists(&dir).await?;
            if !present {
                return Err(DeviceError::LayoutMissing(dir.display().to_string()));
            }
        }
        Ok(())
    }

    /// Attach a volume: verify layout, check pairing, open the database.
    ///
    /// Returns the device identity when available. A device that requires
    /// pairing but has none parks the monitor in `WaitingForPairing`; call
    /// [`retry`](Self::retry) once external setup completes.
    pub async fn connect(
        &self,
        volume: Arc<dyn VolumeAccess>,
    ) -> Result<(Database, Option<DeviceInfo>)> {
        self.set_state(ConnectionState::Connecting).await;
        *self.volume.lock().await = Some(Arc::clone(&volume));

        if let Err(e) = Self::verify_layout(volume.as_ref()).await {
            self.set_state(ConnectionState::Disconnected).await;
            *self.volume.lock().await = None;
            return Err(e);
        }

        let info = DeviceInfo::read(volume.as_ref()).await;
        if let Some(info) = &info {
            if info.requires_pairing() && !info.is_paired() {
                warn!(label = %volume.label(), "Device needs pairing setup, waiting");
                self.set_state(ConnectionState::WaitingForPairing).await;
                self.events
                    .emit(CoreEvent::Device(DeviceEvent::PairingRequired {
                        label: volume.label(),
                    }))
                    .ok();
                return Err(DeviceError::PairingRequired);
            }
        }

        // A factory-blank device has the layout but no database yet;
        // initialize one named after the volume. A present-but-corrupt
        // file stays fatal.
        let database = match self.open_database(volume.as_ref()).await {
            Ok(database) => database,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                *self.volume.lock().await = None;
                return Err(e);
            }
        };

        self.set_state(ConnectionState::Connected).await;
        self.events
            .emit(CoreEvent::Device(DeviceEvent::Connected {
                label: volume.label(),
                track_count: database.track_count() as u64,
            }))
            .ok();
        info!(label = %volume.label(), tracks = database.track_count(), "Device connected");

        Ok((database, info))
    }

    async fn open_database(&self, volume: &dyn VolumeAccess) -> Result<Database> {
        if volume.exists(&layout::database_path()).await? {
            let (database, _) = Database::load(volume).await?;
            Ok(database)
        } else {
            info!(label = %volume.label(), "No database on device, initializing");
            Ok(Database::new(&volume.label()))
        }
    }

    /// Re-run connection checks after external pairing setup completed.
    pub async fn retry(&self) -> Result<(Database, Option<DeviceInfo>)> {
        let volume = self
            .volume
            .lock()
            .await
            .clone()
            .ok_or(DeviceError::NotConnected)?;
        self.connect(volume).await
    }

    /// One reachability probe. Returns `false` once the monitor is
    /// disconnected. Never overlaps with itself.
    pub async fn probe_once(&self) -> bool {
        if self
            .probe_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Probe already in flight, skipping");
            return true;
        }

        let result = self.probe_inner().await;
        self.probe_busy.store(false, Ordering::SeqCst);
        result
    }

    async fn probe_inner(&self) -> bool {
        if self.state().await != ConnectionState::Connected {
            return false;
        }
        let Some(volume) = self.volume().await else {
            return false;
        };

        match Self::verify_layout(volume.as_ref()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Reachability probe failed: {}", e);
                self.disconnect("device no longer reachable").await;
                false
            }
        }
    }

    /// Spawn the periodic probe loop; it runs until the device
    /// disconnects.
    pub fn spawn_probe(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.config.probe_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !monitor.probe_once().await {
                    break;
                }
            }
        })
    }

    /// Drop the connection and tear down all session state.
    pub async fn disconnect(&self, reason: &str) {
        let was_connected = {
            let mut state = self.state.lock().await;
            let was = *state != ConnectionState::Disconnected;
            *state = ConnectionState::Disconnected;
            was
        };
        *self.volume.lock().await = None;

        if was_connected {
            info!(reason, "Disconnecting device");
            self.teardown.teardown().await;
            self.events
                .emit(CoreEvent::Device(DeviceEvent::Disconnected {
                    reason: reason.to_string(),
                }))
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DeviceSession;
    use bridge_desktop::MemoryVolume;
    use bytes::Bytes;
    use core_metadata::MetadataResolver;
    use core_sync::StagingQueue;

    fn monitor() -> (Arc<ConnectionMonitor>, Arc<DeviceSession>, EventBus) {
        let staging = Arc::new(StagingQueue::new(Arc::new(MetadataResolver::new())));
        let session = Arc::new(DeviceSession::new(staging));
        let events = EventBus::new(64);
        let monitor = Arc::new(ConnectionMonitor::new(
            MonitorConfig::default(),
            Arc::clone(&session) as Arc<dyn SessionTeardown>,
            events.clone(),
        ));
        (monitor, session, events)
    }

    #[tokio::test]
    async fn test_connect_blank_device_initializes_database() {
        let (monitor, _, _) = monitor();
        let volume = Arc::new(MemoryVolume::with_player_layout("FRESH"));

        let (db, info) = monitor.connect(volume).await.unwrap();
        assert_eq!(db.track_count(), 0);
        assert_eq!(db.device_name(), "FRESH");
        assert!(info.is_none());
        assert_eq!(monitor.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_rejects_missing_layout() {
        let (monitor, _, _) = monitor();
        let volume = Arc::new(MemoryVolume::new("NOTAPLAYER"));

        let err = monitor.connect(volume).await.unwrap_err();
        assert!(matches!(err, DeviceError::LayoutMissing(_)));
        assert_eq!(monitor.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unpaired_device_waits() {
        let (monitor, _, _) = monitor();
        let volume = Arc::new(MemoryVolume::with_player_layout("NEW"));
        use bridge_traits::volume::VolumeAccess as _;
        volume
            .write_file(
                &layout::sysinfo_path(),
                Bytes::from("ModelNumStr: PL450\nChecksumType: 1\n"),
            )
            .await
            .unwrap();

        let err = monitor.connect(volume.clone()).await.unwrap_err();
        assert!(matches!(err, DeviceError::PairingRequired));
        assert_eq!(monitor.state().await, ConnectionState::WaitingForPairing);

        // External setup writes the pairing id; retry succeeds.
        volume
            .write_file(
                &layout::sysinfo_path(),
                Bytes::from("ModelNumStr: PL450\nChecksumType: 1\nPairingGuid: 0xAB12\n"),
            )
            .await
            .unwrap();
        monitor.retry().await.unwrap();
        assert_eq!(monitor.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_probe_failure_tears_down() {
        let (monitor, session, _) = monitor();
        let volume = Arc::new(MemoryVolume::with_player_layout("P"));

        let (db, _) = monitor.connect(volume.clone()).await.unwrap();
        session.open(db).await;

        assert!(monitor.probe_once().await);

        volume.drop_dir(std::path::Path::new("Control/MediaDB"));
        assert!(!monitor.probe_once().await);

        assert_eq!(monitor.state().await, ConnectionState::Disconnected);
        assert!(session.database.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_emits_event() {
        let (monitor, _, events) = monitor();
        let mut rx = events.subscribe();
        let volume = Arc::new(MemoryVolume::with_player_layout("P"));

        monitor.connect(volume).await.unwrap();
        monitor.disconnect("user ejected").await;

        let mut saw_disconnect = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, CoreEvent::Device(DeviceEvent::Disconnected { .. })) {
                saw_disconnect = true;
            }
        }
        assert!(saw_disconnect);
        assert_eq!(monitor.state().await, ConnectionState::Disconnected);
    }
}
