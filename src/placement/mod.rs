//! Placement request/response types and the engine entry points.

mod orchestrator;
mod selector;
mod solver;

pub use orchestrator::{
    delete_instance, place_instance, transition_events, random_ephemeral_port,
};
pub use selector::select_cycle;
pub use solver::{DeviceCandidate, PlacementSolver};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::errors::{PlacementError, Result};
use crate::topology::{Cycle, Topology};
use crate::{DeviceId, NodeId};

/// Unique identifier of a placed model instance.
pub type InstanceId = Uuid;

/// How model weights are partitioned across the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharding {
    /// Each device holds a disjoint, sequential slice of layers.
    Pipeline,
    /// Layer weight matrices are split across all devices in the cycle.
    Tensor,
}

/// One partition of the model's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    /// Position of this shard in the model, 0-indexed
    pub index: usize,

    /// Weight bytes this shard occupies on its device
    pub size_bytes: u64,
}

impl ShardSpec {
    /// Split a model into `count` near-equal shards; the last shard
    /// absorbs the division remainder.
    pub fn split_even(model_size_bytes: u64, count: usize) -> Vec<ShardSpec> {
        if count == 0 {
            return Vec::new();
        }
        let base = model_size_bytes / count as u64;
        (0..count)
            .map(|index| ShardSpec {
                index,
                size_bytes: if index == count - 1 {
                    model_size_bytes - base * (count as u64 - 1)
                } else {
                    base
                },
            })
            .collect()
    }
}

/// Per-node host memory usage, consulted by the cycle selector.
///
/// This is node RAM for staging the full model, not device memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeMemory {
    pub ram_total_bytes: u64,
    pub ram_available_bytes: u64,
}

/// A request to place one model instance on the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRequest {
    /// Model identifier (e.g. "llama-70b")
    pub model_id: String,

    /// Total model weight size in bytes
    pub model_size_bytes: u64,

    /// Model hidden dimension, used for the tensor divisibility check
    pub hidden_size: u32,

    /// Requested sharding mode
    pub sharding: Sharding,

    /// Minimum number of nodes in the selected cycle
    pub min_nodes: usize,

    /// Nodes the cycle must contain, if any
    pub required_nodes: Option<BTreeSet<NodeId>>,

    /// Prefer cycles composed entirely of RDMA-class links
    pub prefer_rdma: bool,
}

impl PlacementRequest {
    /// Reject malformed requests before any work is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.is_empty() {
            return Err(PlacementError::InvalidRequest(
                "model_id cannot be empty".to_string(),
            ));
        }
        if self.model_size_bytes == 0 {
            return Err(PlacementError::InvalidRequest(
                "model size must be positive".to_string(),
            ));
        }
        if self.min_nodes == 0 {
            return Err(PlacementError::InvalidRequest(
                "min_nodes must be at least 1".to_string(),
            ));
        }
        if self.sharding == Sharding::Tensor && self.hidden_size == 0 {
            return Err(PlacementError::InvalidRequest(
                "tensor sharding requires a positive hidden_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// A placed model instance: the chosen cycle plus the shard-to-device
/// mapping. Consumed by the caller to spin up the actual runners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub model_id: String,
    pub sharding: Sharding,

    /// Nodes hosting this instance, in cycle order
    pub cycle: Cycle,

    /// Connectivity among the cycle's nodes, induced from the cluster
    /// topology at placement time. Runners use its link metrics.
    pub topology: Topology,

    /// Shard sizes, indexed by shard position
    pub shards: Vec<ShardSpec>,

    /// Total mapping from shard index to the device holding it
    pub assignments: BTreeMap<usize, DeviceId>,

    /// Ephemeral port the instance coordinator listens on
    pub coordinator_port: u16,
}

/// State-transition events applied to shared cluster state by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterEvent {
    InstanceCreated { instance: Instance },
    InstanceDeleted { instance_id: InstanceId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_even_exact() {
        let shards = ShardSpec::split_even(12_000, 4);
        assert_eq!(shards.len(), 4);
        assert!(shards.iter().all(|s| s.size_bytes == 3_000));
        assert_eq!(shards.iter().map(|s| s.size_bytes).sum::<u64>(), 12_000);
    }

    #[test]
    fn test_split_even_remainder_goes_last() {
        let shards = ShardSpec::split_even(10, 3);
        assert_eq!(shards[0].size_bytes, 3);
        assert_eq!(shards[1].size_bytes, 3);
        assert_eq!(shards[2].size_bytes, 4);
    }

    #[test]
    fn test_request_validation() {
        let mut request = PlacementRequest {
            model_id: "llama-70b".to_string(),
            model_size_bytes: 140_000_000_000,
            hidden_size: 8192,
            sharding: Sharding::Pipeline,
            min_nodes: 2,
            required_nodes: None,
            prefer_rdma: false,
        };
        assert!(request.validate().is_ok());

        request.model_size_bytes = 0;
        assert!(request.validate().is_err());

        request.model_size_bytes = 1;
        request.min_nodes = 0;
        assert!(request.validate().is_err());

        request.min_nodes = 1;
        request.sharding = Sharding::Tensor;
        request.hidden_size = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cluster_event_serialization() {
        let event = ClusterEvent::InstanceDeleted {
            instance_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"instance_deleted\""));

        let loaded: ClusterEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(loaded, ClusterEvent::InstanceDeleted { .. }));
    }
}
