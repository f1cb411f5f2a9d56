//! Cluster connectivity graph and cycle enumeration.
//!
//! The topology is consumed as an already-built graph; discovery and
//! link measurement belong to external collaborators.

mod cycles;
mod graph;

pub use cycles::{enumerate_cycles, Cycle};
pub use graph::{LinkMetrics, Topology};
