use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::device::{DeviceCapability, TelemetrySnapshot};
use crate::errors::{PlacementError, Result};
use crate::telemetry::aggregate::{aggregate_metrics, ClusterMetrics};
use crate::DeviceId;

/// Immutable view of one device for a single placement attempt.
///
/// Pairs the static capability record with the most recent telemetry
/// snapshot at the time the view was taken.
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub capability: DeviceCapability,
    pub telemetry: TelemetrySnapshot,
}

impl DeviceView {
    /// Memory available for new shards on this device.
    pub fn memory_available_bytes(&self) -> u64 {
        self.telemetry.memory_available_bytes()
    }
}

struct DeviceEntry {
    capability: DeviceCapability,
    /// Bounded history, newest at the back. The back entry is the
    /// "current" snapshot.
    history: VecDeque<TelemetrySnapshot>,
}

/// Registered devices plus their bounded telemetry histories.
///
/// Snapshot writes for a device are applied in receipt order under the
/// store lock, so history eviction and the current pointer update are
/// atomic. Reads clone out of the lock and never block ingestion.
#[derive(Clone)]
pub struct TelemetryStore {
    devices: Arc<RwLock<HashMap<DeviceId, DeviceEntry>>>,
    max_history: usize,
}

impl TelemetryStore {
    /// Create a store keeping at most `max_history` snapshots per device.
    pub fn new(max_history: usize) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            max_history: max_history.max(1),
        }
    }

    /// Register a discovered device. Replaces the capability record if
    /// the device was already registered, keeping its history.
    pub fn register_device(&self, capability: DeviceCapability) -> Result<()> {
        let mut devices = self.write_lock()?;
        let device_id = capability.device_id.clone();

        match devices.get_mut(&device_id) {
            Some(entry) => entry.capability = capability,
            None => {
                devices.insert(
                    device_id.clone(),
                    DeviceEntry {
                        capability,
                        history: VecDeque::new(),
                    },
                );
            }
        }

        info!(device_id = %device_id, "Device registered");
        Ok(())
    }

    /// Record a telemetry snapshot.
    ///
    /// Rejects snapshots that violate the telemetry invariants or name an
    /// unregistered device; rejected snapshots never touch existing
    /// history and ingestion continues for subsequent snapshots.
    pub fn record(&self, snapshot: TelemetrySnapshot) -> Result<()> {
        if let Err(e) = snapshot.validate() {
            warn!(device_id = %snapshot.device_id, error = %e, "Dropping invalid telemetry snapshot");
            return Err(e);
        }

        let mut devices = self.write_lock()?;
        let entry = devices.get_mut(&snapshot.device_id).ok_or_else(|| {
            warn!(device_id = %snapshot.device_id, "Telemetry for unregistered device");
            PlacementError::InvalidMetrics {
                device_id: snapshot.device_id.clone(),
                reason: "device was never registered".to_string(),
            }
        })?;

        if entry.history.len() == self.max_history {
            entry.history.pop_front();
        }
        debug!(device_id = %snapshot.device_id, history_len = entry.history.len() + 1, "Recorded telemetry");
        entry.history.push_back(snapshot);
        Ok(())
    }

    /// Most recent snapshot for a device, if it has reported.
    pub fn current_snapshot(&self, device_id: &str) -> Result<Option<TelemetrySnapshot>> {
        let devices = self.read_lock()?;
        Ok(devices
            .get(device_id)
            .and_then(|e| e.history.back().cloned()))
    }

    /// Full bounded history for a device, oldest first.
    pub fn history(&self, device_id: &str) -> Result<Vec<TelemetrySnapshot>> {
        let devices = self.read_lock()?;
        Ok(devices
            .get(device_id)
            .map(|e| e.history.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Capability record for a registered device.
    pub fn capability(&self, device_id: &str) -> Result<DeviceCapability> {
        let devices = self.read_lock()?;
        devices
            .get(device_id)
            .map(|e| e.capability.clone())
            .ok_or_else(|| PlacementError::UnknownDevice(device_id.to_string()))
    }

    /// Copy-on-read view of every device that has reported telemetry.
    ///
    /// Callers snapshot this once per placement attempt so the search
    /// never runs against state that mutates mid-decision.
    pub fn device_view(&self) -> Result<Vec<DeviceView>> {
        let devices = self.read_lock()?;
        let mut views: Vec<DeviceView> = devices
            .values()
            .filter_map(|entry| {
                entry.history.back().map(|snapshot| DeviceView {
                    capability: entry.capability.clone(),
                    telemetry: snapshot.clone(),
                })
            })
            .collect();
        views.sort_by(|a, b| a.capability.device_id.cmp(&b.capability.device_id));
        Ok(views)
    }

    /// Aggregate cluster metrics over all devices' current snapshots.
    ///
    /// Never fails: an empty store yields zeroed metrics.
    pub fn aggregate(&self) -> Result<ClusterMetrics> {
        Ok(aggregate_metrics(&self.device_view()?))
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<DeviceId, DeviceEntry>>> {
        self.devices
            .read()
            .map_err(|_| PlacementError::Internal("telemetry store lock poisoned".to_string()))
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<DeviceId, DeviceEntry>>> {
        self.devices
            .write()
            .map_err(|_| PlacementError::Internal("telemetry store lock poisoned".to_string()))
    }
}
