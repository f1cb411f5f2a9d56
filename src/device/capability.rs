use serde::{Deserialize, Serialize};

use crate::{DeviceId, NodeId};

/// GPU vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Qualcomm,
    Other,
}

impl Vendor {
    /// Stable lowercase name, used as the key in vendor breakdowns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Nvidia => "nvidia",
            Vendor::Amd => "amd",
            Vendor::Intel => "intel",
            Vendor::Apple => "apple",
            Vendor::Qualcomm => "qualcomm",
            Vendor::Other => "other",
        }
    }
}

/// Accelerator backend kind the device is driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cuda,
    Rocm,
    Metal,
    Vulkan,
    DirectMl,
    Cpu,
}

/// How well the backend supports this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Full,
    Partial,
    Experimental,
}

/// Default thermal throttle threshold when the backend does not report one.
pub const DEFAULT_THROTTLE_TEMPERATURE_C: f64 = 90.0;

/// Static descriptor of one accelerator device.
///
/// Created once by the discovery layer and never mutated; the placement
/// engine only reads it. Dynamic state lives in [`TelemetrySnapshot`].
///
/// [`TelemetrySnapshot`]: crate::device::TelemetrySnapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCapability {
    /// Unique identifier (e.g. "cuda:0", "metal:0")
    pub device_id: DeviceId,

    /// Node that owns this device
    pub node_id: NodeId,

    /// Human-readable name (e.g. "NVIDIA RTX 4090")
    pub name: String,

    /// GPU vendor
    pub vendor: Vendor,

    /// Backend driving the device
    pub backend: Backend,

    /// Compute capability tag (e.g. "8.9" for NVIDIA, "RDNA3" for AMD)
    pub compute_capability: String,

    /// Total device memory in bytes
    pub memory_bytes: u64,

    /// Number of compute units (SMs for NVIDIA, CUs for AMD)
    pub compute_units: u32,

    /// GPU clock rate in MHz
    pub clock_rate_mhz: u32,

    /// Measured or estimated memory bandwidth in GB/s
    pub bandwidth_gbps: f64,

    /// Driver version string
    pub driver_version: String,

    /// Backend support level for this device
    pub support_level: SupportLevel,

    /// Temperature at which the device starts throttling
    pub throttle_temperature_c: f64,
}

impl DeviceCapability {
    /// Raw compute throughput proxy: compute units x clock rate.
    ///
    /// A heuristic ranking signal, not a FLOPS measurement.
    pub fn compute_proxy(&self) -> f64 {
        self.compute_units as f64 * self.clock_rate_mhz as f64
    }

    /// Compute proxy weighted by memory bandwidth, used for the cluster
    /// heterogeneity ratio.
    pub fn heterogeneity_proxy(&self) -> f64 {
        self.compute_units as f64 * self.bandwidth_gbps * self.clock_rate_mhz as f64 / 1000.0
    }
}
