use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Weights for the composite device suitability score.
///
/// One canonical weighting is used everywhere a composite score is
/// computed: the CSP solver's domain ordering, the greedy fallback, and
/// device ranking queries. Weights must sum to 1.0 for the composite to
/// stay in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of raw compute throughput (compute units x clock rate)
    pub compute: f64,

    /// Weight of memory headroom relative to shard size
    pub memory: f64,

    /// Weight of network position in the cycle
    pub network: f64,

    /// Weight of thermal headroom below the throttle threshold
    pub thermal: f64,

    /// Weight of memory bandwidth relative to the cluster average
    pub bandwidth: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            compute: 0.40,
            memory: 0.30,
            network: 0.15,
            thermal: 0.10,
            bandwidth: 0.05,
        }
    }
}

impl ScoreWeights {
    /// Sum of all component weights.
    pub fn total(&self) -> f64 {
        self.compute + self.memory + self.network + self.thermal + self.bandwidth
    }
}

/// Configuration for one placement engine instance.
///
/// Threaded explicitly through calls; there is no process-global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Wall-clock budget for the CSP search before the greedy fallback
    #[serde(with = "duration_millis")]
    pub csp_timeout: Duration,

    /// Maximum backtracking depth before the search gives up
    pub max_backtrack_depth: usize,

    /// Longest cycle the topology enumeration will consider
    pub max_cycle_length: usize,

    /// Bounded telemetry history kept per device
    pub max_telemetry_history: usize,

    /// Composite score weighting
    pub score_weights: ScoreWeights,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            csp_timeout: Duration::from_secs(5),
            max_backtrack_depth: 100,
            max_cycle_length: 16,
            max_telemetry_history: 100,
            score_weights: ScoreWeights::default(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
