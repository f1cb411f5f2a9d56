use serde::{Deserialize, Serialize};

use crate::errors::{PlacementError, Result};
use crate::DeviceId;

/// Absolute zero in Celsius; temperatures at or below this are garbage.
const ABSOLUTE_ZERO_C: f64 = -273.15;

/// One telemetry reading from a device.
///
/// Produced periodically by the telemetry collector on the node that owns
/// the device. The aggregator keeps the most recent snapshot plus a
/// bounded history per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Device this reading belongs to
    pub device_id: DeviceId,

    /// Collection time, Unix milliseconds
    pub timestamp_ms: u64,

    /// Memory currently in use, bytes
    pub memory_used_bytes: u64,

    /// Total device memory, bytes
    pub memory_total_bytes: u64,

    /// Compute utilization, 0-100
    pub compute_utilization_percent: f64,

    /// Core temperature in Celsius
    pub temperature_celsius: f64,

    /// Power draw in watts
    pub power_watts: f64,

    /// Current clock rate in MHz
    pub clock_rate_mhz: u32,
}

impl TelemetrySnapshot {
    /// Memory not currently in use.
    pub fn memory_available_bytes(&self) -> u64 {
        self.memory_total_bytes.saturating_sub(self.memory_used_bytes)
    }

    /// Check the snapshot invariants.
    ///
    /// Invalid snapshots are dropped by the store without touching
    /// existing history.
    pub fn validate(&self) -> Result<()> {
        if self.memory_used_bytes > self.memory_total_bytes {
            return Err(self.invalid(format!(
                "used memory {} exceeds total {}",
                self.memory_used_bytes, self.memory_total_bytes
            )));
        }
        if !(0.0..=100.0).contains(&self.compute_utilization_percent)
            || self.compute_utilization_percent.is_nan()
        {
            return Err(self.invalid(format!(
                "utilization {} out of range 0-100",
                self.compute_utilization_percent
            )));
        }
        if self.temperature_celsius <= ABSOLUTE_ZERO_C || self.temperature_celsius.is_nan() {
            return Err(self.invalid(format!(
                "temperature {}C below absolute zero",
                self.temperature_celsius
            )));
        }
        if self.power_watts < 0.0 || self.power_watts.is_nan() {
            return Err(self.invalid(format!("negative power draw {}W", self.power_watts)));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> PlacementError {
        PlacementError::InvalidMetrics {
            device_id: self.device_id.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            device_id: "cuda:0".to_string(),
            timestamp_ms: 1_700_000_000_000,
            memory_used_bytes: 4 * 1024 * 1024 * 1024,
            memory_total_bytes: 24 * 1024 * 1024 * 1024,
            compute_utilization_percent: 35.0,
            temperature_celsius: 62.0,
            power_watts: 280.0,
            clock_rate_mhz: 2400,
        }
    }

    #[test]
    fn test_valid_snapshot() {
        assert!(snapshot().validate().is_ok());
    }

    #[test]
    fn test_memory_available() {
        let snap = snapshot();
        assert_eq!(
            snap.memory_available_bytes(),
            snap.memory_total_bytes - snap.memory_used_bytes
        );
    }

    #[test]
    fn test_used_exceeds_total_rejected() {
        let mut snap = snapshot();
        snap.memory_used_bytes = snap.memory_total_bytes + 1;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_utilization_out_of_range_rejected() {
        let mut snap = snapshot();
        snap.compute_utilization_percent = 120.0;
        assert!(snap.validate().is_err());

        snap.compute_utilization_percent = -5.0;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_temperature_below_absolute_zero_rejected() {
        let mut snap = snapshot();
        snap.temperature_celsius = -300.0;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let loaded: TelemetrySnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.device_id, snap.device_id);
        assert_eq!(loaded.memory_used_bytes, snap.memory_used_bytes);
        assert_eq!(loaded.clock_rate_mhz, snap.clock_rate_mhz);
    }
}
