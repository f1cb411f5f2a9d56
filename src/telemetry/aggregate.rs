use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::telemetry::DeviceView;

/// Aggregated metrics over all devices' current snapshots.
///
/// Derived on demand; zeroed when no devices have reported yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// Devices that have reported telemetry
    pub device_count: usize,

    /// Total device memory across the cluster, bytes
    pub total_memory_bytes: u64,

    /// Memory currently in use across the cluster, bytes
    pub used_memory_bytes: u64,

    /// Memory available across the cluster, bytes
    pub available_memory_bytes: u64,

    /// Sum of compute units across all devices
    pub total_compute_units: u64,

    /// Mean device memory bandwidth, GB/s
    pub average_bandwidth_gbps: f64,

    /// Slowest device bandwidth, GB/s (the bottleneck)
    pub bottleneck_bandwidth_gbps: f64,

    /// Mean compute utilization, 0-100
    pub average_utilization_percent: f64,

    /// Mean device temperature, Celsius
    pub average_temperature_celsius: f64,

    /// Total power draw, watts
    pub total_power_watts: f64,

    /// max/min compute proxy across devices; 1.0 for zero or one device
    pub heterogeneity_ratio: f64,

    /// Strongest compute proxy observed, used to normalize compute scores
    pub max_compute_proxy: f64,

    /// Device count per vendor
    pub device_count_by_vendor: HashMap<String, usize>,
}

/// Aggregate cluster metrics from a set of device views.
///
/// Pure over the passed-in views; the store's `aggregate()` delegates
/// here with a copy-on-read view. An empty slice yields zeroed metrics
/// with a heterogeneity ratio of 1.0, never an error.
pub fn aggregate_metrics(views: &[DeviceView]) -> ClusterMetrics {
    let mut metrics = ClusterMetrics {
        heterogeneity_ratio: 1.0,
        ..ClusterMetrics::default()
    };

    if views.is_empty() {
        return metrics;
    }

    let mut vendor_counts: HashMap<String, usize> = HashMap::new();
    let mut bandwidths = Vec::with_capacity(views.len());
    let mut utilization_sum = 0.0;
    let mut temperature_sum = 0.0;

    for view in views {
        let cap = &view.capability;
        let snap = &view.telemetry;

        metrics.total_memory_bytes += snap.memory_total_bytes;
        metrics.used_memory_bytes += snap.memory_used_bytes;
        metrics.total_compute_units += cap.compute_units as u64;
        metrics.total_power_watts += snap.power_watts;
        utilization_sum += snap.compute_utilization_percent;
        temperature_sum += snap.temperature_celsius;
        bandwidths.push(cap.bandwidth_gbps);

        *vendor_counts.entry(cap.vendor.as_str().to_string()).or_insert(0) += 1;
    }

    let count = views.len();
    metrics.device_count = count;
    metrics.available_memory_bytes = metrics
        .total_memory_bytes
        .saturating_sub(metrics.used_memory_bytes);
    metrics.average_bandwidth_gbps = bandwidths.iter().sum::<f64>() / count as f64;
    metrics.bottleneck_bandwidth_gbps = bandwidths.iter().copied().fold(f64::INFINITY, f64::min);
    metrics.average_utilization_percent = utilization_sum / count as f64;
    metrics.average_temperature_celsius = temperature_sum / count as f64;
    metrics.device_count_by_vendor = vendor_counts;

    let proxies: Vec<f64> = views
        .iter()
        .map(|v| v.capability.heterogeneity_proxy())
        .collect();
    let max_proxy = proxies.iter().copied().fold(0.0_f64, f64::max);
    let min_proxy = proxies.iter().copied().fold(f64::INFINITY, f64::min);
    metrics.heterogeneity_ratio = if count <= 1 || min_proxy <= 0.0 {
        1.0
    } else {
        max_proxy / min_proxy
    };

    metrics.max_compute_proxy = views
        .iter()
        .map(|v| v.capability.compute_proxy())
        .fold(0.0_f64, f64::max);

    metrics
}
