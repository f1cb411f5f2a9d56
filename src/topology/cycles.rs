use serde::{Deserialize, Serialize};

use crate::topology::Topology;
use crate::NodeId;

/// An ordered set of connected nodes considered as one placement unit.
///
/// Ephemeral: recomputed from the topology per placement request. Two
/// connected nodes count as a cycle of length 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub node_ids: Vec<NodeId>,
}

impl Cycle {
    pub fn new(node_ids: Vec<NodeId>) -> Self {
        Self { node_ids }
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node_ids.iter().any(|n| n == node_id)
    }
}

/// Enumerate all simple cycles of length 2..=`max_len`.
///
/// Each undirected edge contributes one 2-node cycle; longer cycles come
/// from a DFS rooted at the smallest node of each cycle, with the second
/// node required to sort below the last to skip mirror-image duplicates.
pub fn enumerate_cycles(topology: &Topology, max_len: usize) -> Vec<Cycle> {
    let mut cycles = Vec::new();

    // Connected pairs
    if max_len >= 2 {
        for a in topology.nodes() {
            for b in topology.neighbors(a) {
                if a < b {
                    cycles.push(Cycle::new(vec![a.clone(), b.clone()]));
                }
            }
        }
    }

    if max_len >= 3 {
        let mut path: Vec<NodeId> = Vec::new();
        for start in topology.nodes() {
            path.push(start.clone());
            dfs_cycles(topology, start, max_len, &mut path, &mut cycles);
            path.pop();
        }
    }

    cycles
}

fn dfs_cycles(
    topology: &Topology,
    start: &NodeId,
    max_len: usize,
    path: &mut Vec<NodeId>,
    out: &mut Vec<Cycle>,
) {
    let current = path.last().expect("path is never empty").clone();
    for neighbor in topology.neighbors(&current) {
        if neighbor == start {
            // Canonical form: cycle starts at its smallest node and the
            // second node sorts below the last, so each simple cycle is
            // recorded exactly once.
            if path.len() >= 3 && path[1] < path[path.len() - 1] {
                out.push(Cycle::new(path.clone()));
            }
            continue;
        }
        if path.len() == max_len {
            continue;
        }
        // Restricting descent to nodes above the start makes the start
        // the minimum of every recorded cycle.
        if neighbor > start && !path.contains(neighbor) {
            path.push(neighbor.clone());
            dfs_cycles(topology, start, max_len, path, out);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::LinkMetrics;

    fn link() -> LinkMetrics {
        LinkMetrics::ethernet(1.0, 10.0)
    }

    fn ring(names: &[&str]) -> Topology {
        let mut topo = Topology::new();
        for pair in names.windows(2) {
            topo.add_link(pair[0], pair[1], link());
        }
        topo.add_link(*names.last().unwrap(), names[0], link());
        topo
    }

    #[test]
    fn test_triangle_yields_one_three_cycle() {
        let topo = ring(&["a", "b", "c"]);
        let cycles = enumerate_cycles(&topo, 8);

        let three: Vec<&Cycle> = cycles.iter().filter(|c| c.len() == 3).collect();
        assert_eq!(three.len(), 1);
        assert_eq!(three[0].node_ids, vec!["a", "b", "c"]);

        // Each edge also appears as a connected pair
        assert_eq!(cycles.iter().filter(|c| c.len() == 2).count(), 3);
    }

    #[test]
    fn test_square_yields_one_four_cycle() {
        let topo = ring(&["a", "b", "c", "d"]);
        let cycles = enumerate_cycles(&topo, 8);

        let four: Vec<&Cycle> = cycles.iter().filter(|c| c.len() == 4).collect();
        assert_eq!(four.len(), 1);
        assert_eq!(cycles.iter().filter(|c| c.len() == 3).count(), 0);
    }

    #[test]
    fn test_disconnected_components_enumerated_separately() {
        // 4-ring plus a separate connected pair
        let mut topo = ring(&["a", "b", "c", "d"]);
        topo.add_link("x", "y", link());

        let cycles = enumerate_cycles(&topo, 8);
        assert!(cycles.iter().any(|c| c.len() == 4));
        assert!(cycles
            .iter()
            .any(|c| c.node_ids == vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_max_len_bounds_search() {
        let topo = ring(&["a", "b", "c", "d", "e"]);
        let cycles = enumerate_cycles(&topo, 4);
        assert!(cycles.iter().all(|c| c.len() <= 4));
        assert!(!cycles.iter().any(|c| c.len() == 5));

        let unbounded = enumerate_cycles(&topo, 5);
        assert!(unbounded.iter().any(|c| c.len() == 5));
    }

    #[test]
    fn test_complete_graph_counts() {
        // K4: 6 pairs, 4 triangles, 3 four-cycles
        let mut topo = Topology::new();
        let names = ["a", "b", "c", "d"];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                topo.add_link(*a, *b, link());
            }
        }

        let cycles = enumerate_cycles(&topo, 8);
        assert_eq!(cycles.iter().filter(|c| c.len() == 2).count(), 6);
        assert_eq!(cycles.iter().filter(|c| c.len() == 3).count(), 4);
        assert_eq!(cycles.iter().filter(|c| c.len() == 4).count(), 3);
    }
}
