//! Device suitability scoring.
//!
//! One pure scoring function with a single canonical weighting, used by
//! the CSP solver, the greedy fallback, and ranking queries alike.
//! Scores are heuristic proxies recomputed from current telemetry on
//! every placement decision, not measured benchmarks.

use serde::{Deserialize, Serialize};

use crate::config::ScoreWeights;
use crate::telemetry::{ClusterMetrics, DeviceView};
use crate::{DeviceId, NodeId};

/// Fallback compute proxy (compute units x clock MHz) when the candidate
/// set has no observed maximum. Roughly an H100 SXM.
const REFERENCE_COMPUTE_PROXY: f64 = 132.0 * 1980.0;

/// Placeholder network position signal. A real centrality score would be
/// derived from measured link latency/bandwidth to other cycle members.
const NETWORK_SCORE_PLACEHOLDER: f64 = 0.8;

/// Degrees Celsius of headroom below the throttle threshold at which the
/// thermal score saturates at 1.0.
const THERMAL_FULL_HEADROOM_C: f64 = 20.0;

/// Thermal score floor: a device past its throttle threshold is still
/// usable, just strongly deprioritized.
const THERMAL_SCORE_FLOOR: f64 = 0.1;

/// Suitability of one device for holding a shard.
///
/// All components and the composite are in [0, 1], higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceScore {
    pub device_id: DeviceId,
    pub node_id: NodeId,

    /// Compute throughput relative to the strongest candidate
    pub compute_score: f64,

    /// Memory headroom relative to the shard size
    pub memory_score: f64,

    /// Network position in the cycle (placeholder signal)
    pub network_score: f64,

    /// Headroom below the thermal throttle threshold
    pub thermal_score: f64,

    /// Memory bandwidth relative to the cluster average
    pub bandwidth_score: f64,

    /// Weighted combination of the above
    pub composite: f64,
}

/// Score a device for a shard of `shard_size_bytes`.
///
/// `cluster` provides the normalization references (strongest compute
/// proxy in the candidate set, average bandwidth); compute it once per
/// placement attempt over the candidate devices.
pub fn score_device(
    view: &DeviceView,
    shard_size_bytes: u64,
    cluster: &ClusterMetrics,
    weights: &ScoreWeights,
) -> DeviceScore {
    let cap = &view.capability;
    let snap = &view.telemetry;

    let memory_score = memory_score(snap.memory_available_bytes(), shard_size_bytes);

    let reference = if cluster.max_compute_proxy > 0.0 {
        cluster.max_compute_proxy
    } else {
        REFERENCE_COMPUTE_PROXY
    };
    let compute_score = (cap.compute_proxy() / reference).clamp(0.0, 1.0);

    let bandwidth_score = if cluster.average_bandwidth_gbps > 0.0 {
        (cap.bandwidth_gbps / cluster.average_bandwidth_gbps).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let margin = cap.throttle_temperature_c - snap.temperature_celsius;
    let thermal_score = (margin / THERMAL_FULL_HEADROOM_C).clamp(THERMAL_SCORE_FLOOR, 1.0);

    let network_score = NETWORK_SCORE_PLACEHOLDER;

    let composite = (compute_score * weights.compute
        + memory_score * weights.memory
        + network_score * weights.network
        + thermal_score * weights.thermal
        + bandwidth_score * weights.bandwidth)
        .clamp(0.0, 1.0);

    DeviceScore {
        device_id: cap.device_id.clone(),
        node_id: cap.node_id.clone(),
        compute_score,
        memory_score,
        network_score,
        thermal_score,
        bandwidth_score,
        composite,
    }
}

/// Memory fit: 0 below the shard size, 1 at twice the shard size or
/// more, linear in between.
fn memory_score(available_bytes: u64, shard_size_bytes: u64) -> f64 {
    if shard_size_bytes == 0 {
        return 1.0;
    }
    if available_bytes < shard_size_bytes {
        return 0.0;
    }
    if available_bytes >= shard_size_bytes * 2 {
        return 1.0;
    }
    (available_bytes - shard_size_bytes) as f64 / shard_size_bytes as f64
}

/// Score every candidate device and sort best-first by composite.
pub fn rank_devices(
    views: &[DeviceView],
    shard_size_bytes: u64,
    cluster: &ClusterMetrics,
    weights: &ScoreWeights,
) -> Vec<DeviceScore> {
    let mut scores: Vec<DeviceScore> = views
        .iter()
        .map(|v| score_device(v, shard_size_bytes, cluster, weights))
        .collect();
    scores.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.device_id.cmp(&b.device_id))
    });
    scores
}
