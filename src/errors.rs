use thiserror::Error;

/// Errors that can occur in the placement engine.
#[derive(Error, Debug)]
pub enum PlacementError {
    /// Request was malformed (empty device list, negative sizes, etc.)
    /// and was rejected before any work was attempted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No cycle in the topology satisfies the request constraints.
    #[error("No feasible cycle: {0}")]
    NoFeasibleCycle(String),

    /// Neither the CSP search nor the greedy fallback could produce a
    /// memory-respecting assignment for every shard.
    #[error("No valid placement: {0}")]
    NoValidPlacement(String),

    /// A telemetry snapshot violated its invariants and was dropped.
    #[error("Invalid metrics for device {device_id}: {reason}")]
    InvalidMetrics { device_id: String, reason: String },

    /// Capacity weights for workload distribution were negative or all zero.
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    /// A device id was referenced that was never registered.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Instance id not present in the current instance map.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Internal error (lock poisoning, invariant breakage).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for placement operations.
pub type Result<T> = std::result::Result<T, PlacementError>;
