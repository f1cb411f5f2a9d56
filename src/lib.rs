//! Shard placement engine for heterogeneous distributed inference clusters.
//!
//! Given a cluster topology, per-node memory usage, and live per-device
//! telemetry, this crate decides which GPU device holds which model shard:
//! cycle selection over the topology, multi-factor device scoring, a CSP
//! backtracking solver with a greedy fallback, and the telemetry
//! aggregation that feeds the scorer.
//!
//! The engine is a library invoked by a control plane; it exposes no
//! network protocol and owns no persistent state.

pub mod config;
pub mod device;
pub mod distributor;
pub mod errors;
pub mod observability;
pub mod placement;
pub mod scoring;
pub mod telemetry;
pub mod topology;

pub use config::{PlacementConfig, ScoreWeights};
pub use device::{
    Backend, DeviceCapability, SupportLevel, TelemetrySnapshot, Vendor,
};
pub use errors::{PlacementError, Result};
pub use placement::{
    ClusterEvent, Instance, InstanceId, PlacementRequest, ShardSpec, Sharding,
};
pub use scoring::DeviceScore;
pub use telemetry::{ClusterMetrics, TelemetryStore};
pub use topology::{Cycle, LinkMetrics, Topology};

/// Node identifier within the mesh.
pub type NodeId = String;

/// Device identifier (e.g. "cuda:0" on a given node).
pub type DeviceId = String;
