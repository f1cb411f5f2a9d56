use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::topology::Cycle;
use crate::NodeId;

/// Metrics for the network link between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkMetrics {
    /// Round-trip latency in milliseconds
    pub latency_ms: f64,

    /// Available bandwidth in Gbps
    pub bandwidth_gbps: f64,

    /// Whether this is a high-throughput RDMA-class link
    pub rdma: bool,
}

impl LinkMetrics {
    /// Conventional ethernet-class link.
    pub fn ethernet(latency_ms: f64, bandwidth_gbps: f64) -> Self {
        Self {
            latency_ms,
            bandwidth_gbps,
            rdma: false,
        }
    }

    /// High-throughput RDMA-class link.
    pub fn rdma(latency_ms: f64, bandwidth_gbps: f64) -> Self {
        Self {
            latency_ms,
            bandwidth_gbps,
            rdma: true,
        }
    }
}

/// Undirected cluster connectivity graph.
///
/// Ordered maps keep node and neighbor iteration deterministic, which
/// in turn keeps cycle enumeration and placement reproducible for a
/// given topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    nodes: BTreeSet<NodeId>,
    links: BTreeMap<NodeId, BTreeMap<NodeId, LinkMetrics>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no links.
    pub fn add_node(&mut self, node_id: impl Into<NodeId>) {
        self.nodes.insert(node_id.into());
    }

    /// Add an undirected link between two nodes, creating them if needed.
    pub fn add_link(
        &mut self,
        a: impl Into<NodeId>,
        b: impl Into<NodeId>,
        metrics: LinkMetrics,
    ) {
        let a = a.into();
        let b = b.into();
        self.nodes.insert(a.clone());
        self.nodes.insert(b.clone());
        self.links
            .entry(a.clone())
            .or_default()
            .insert(b.clone(), metrics.clone());
        self.links.entry(b).or_default().insert(a, metrics);
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in deterministic order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }

    /// Neighbors of a node in deterministic order.
    pub fn neighbors(&self, node_id: &str) -> Vec<&NodeId> {
        self.links
            .get(node_id)
            .map(|m| m.keys().collect())
            .unwrap_or_default()
    }

    /// Link metrics between two nodes, if connected.
    pub fn link(&self, a: &str, b: &str) -> Option<&LinkMetrics> {
        self.links.get(a).and_then(|m| m.get(b))
    }

    pub fn degree(&self, node_id: &str) -> usize {
        self.links.get(node_id).map(|m| m.len()).unwrap_or(0)
    }

    /// A leaf sits at the cluster edge with exactly one link.
    pub fn node_is_leaf(&self, node_id: &str) -> bool {
        self.degree(node_id) == 1
    }

    /// Whether every link along the cycle (including the wrap-around) is
    /// RDMA-class.
    pub fn is_rdma_cycle(&self, cycle: &Cycle) -> bool {
        let nodes = &cycle.node_ids;
        if nodes.len() < 2 {
            return false;
        }
        if nodes.len() == 2 {
            return self
                .link(&nodes[0], &nodes[1])
                .map(|l| l.rdma)
                .unwrap_or(false);
        }
        nodes.iter().enumerate().all(|(i, a)| {
            let b = &nodes[(i + 1) % nodes.len()];
            self.link(a, b).map(|l| l.rdma).unwrap_or(false)
        })
    }

    /// Subgraph induced by a node subset, preserving link metrics.
    pub fn subgraph(&self, keep: &[NodeId]) -> Topology {
        let keep_set: BTreeSet<&NodeId> = keep.iter().collect();
        let mut sub = Topology::new();
        for node in keep {
            if self.nodes.contains(node) {
                sub.add_node(node.clone());
            }
        }
        for (a, neighbors) in &self.links {
            if !keep_set.contains(a) {
                continue;
            }
            for (b, metrics) in neighbors {
                if keep_set.contains(b) && a < b {
                    sub.add_link(a.clone(), b.clone(), metrics.clone());
                }
            }
        }
        sub
    }
}
