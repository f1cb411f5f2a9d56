//! Telemetry ingestion and cluster-wide aggregation.
//!
//! The store is the one piece of mutable shared state in the engine:
//! writes are serialized under a single lock, reads hand out cloned
//! snapshots so placement never blocks ingestion.

mod aggregate;
mod store;

pub use aggregate::{aggregate_metrics, ClusterMetrics};
pub use store::{DeviceView, TelemetryStore};
