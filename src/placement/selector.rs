use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::PlacementConfig;
use crate::errors::{PlacementError, Result};
use crate::placement::{NodeMemory, PlacementRequest, Sharding};
use crate::topology::{enumerate_cycles, Cycle, Topology};
use crate::NodeId;

/// Select the cycle of nodes to place an instance on.
///
/// Pure over the passed-in state. The filter chain, in order: minimum
/// node count, required-node subset, summed node RAM against the model
/// size, tensor-shard divisibility, RDMA-class restriction when
/// requested and attainable, smallest cycle size, leaf-node preference,
/// and finally maximum summed available RAM as the tie-break.
pub fn select_cycle(
    topology: &Topology,
    node_memory: &HashMap<NodeId, NodeMemory>,
    request: &PlacementRequest,
    config: &PlacementConfig,
) -> Result<Cycle> {
    let mut cycles = enumerate_cycles(topology, config.max_cycle_length);
    // A request satisfied by one node degrades to a single-node
    // instance; every node then stands as its own candidate.
    if request.min_nodes <= 1 {
        cycles.extend(topology.nodes().map(|n| Cycle::new(vec![n.clone()])));
    }
    debug!(total = cycles.len(), "Enumerated candidate cycles");

    let mut candidates: Vec<Cycle> = cycles
        .into_iter()
        .filter(|c| c.len() >= request.min_nodes)
        .collect();

    if let Some(required) = &request.required_nodes {
        candidates.retain(|c| required.iter().all(|n| c.contains(n)));
        if candidates.is_empty() {
            return Err(PlacementError::NoFeasibleCycle(format!(
                "no cycle of at least {} nodes contains all {} required nodes",
                request.min_nodes,
                required.len()
            )));
        }
    }

    candidates.retain(|c| cycle_available_ram(c, node_memory) >= request.model_size_bytes);
    if candidates.is_empty() {
        return Err(PlacementError::NoFeasibleCycle(format!(
            "no cycle with at least {} bytes of available RAM",
            request.model_size_bytes
        )));
    }

    // Tensor shards must be equal-sized, so the hidden dimension has to
    // divide evenly across the cycle.
    if request.sharding == Sharding::Tensor {
        candidates.retain(|c| request.hidden_size as usize % c.len() == 0);
        if candidates.is_empty() {
            return Err(PlacementError::NoFeasibleCycle(format!(
                "hidden_size {} is not divisible by any candidate cycle length",
                request.hidden_size
            )));
        }
    }

    if request.prefer_rdma {
        let rdma: Vec<Cycle> = candidates
            .iter()
            .filter(|c| topology.is_rdma_cycle(c))
            .cloned()
            .collect();
        if !rdma.is_empty() {
            debug!(rdma = rdma.len(), "Restricting to all-RDMA cycles");
            candidates = rdma;
        }
    }

    let smallest_len = candidates.iter().map(Cycle::len).min().expect("non-empty");
    let smallest: Vec<Cycle> = candidates
        .into_iter()
        .filter(|c| c.len() == smallest_len)
        .collect();

    // Cluster-edge heuristic: prefer cycles that include a leaf node so
    // well-connected interior nodes stay free for later requests.
    let with_leaves: Vec<Cycle> = smallest
        .iter()
        .filter(|c| c.node_ids.iter().any(|n| topology.node_is_leaf(n)))
        .cloned()
        .collect();
    let pool = if with_leaves.is_empty() {
        smallest
    } else {
        with_leaves
    };

    let selected = pool
        .into_iter()
        .max_by_key(|c| cycle_available_ram(c, node_memory))
        .expect("non-empty");

    info!(
        cycle = ?selected.node_ids,
        nodes = selected.len(),
        model_id = %request.model_id,
        "Selected placement cycle"
    );
    Ok(selected)
}

fn cycle_available_ram(cycle: &Cycle, node_memory: &HashMap<NodeId, NodeMemory>) -> u64 {
    cycle
        .node_ids
        .iter()
        .map(|n| node_memory.get(n).map(|m| m.ram_available_bytes).unwrap_or(0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::LinkMetrics;
    use std::collections::BTreeSet;

    const GB: u64 = 1024 * 1024 * 1024;

    fn memory(nodes: &[&str], available_gb: u64) -> HashMap<NodeId, NodeMemory> {
        nodes
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    NodeMemory {
                        ram_total_bytes: available_gb * 2 * GB,
                        ram_available_bytes: available_gb * GB,
                    },
                )
            })
            .collect()
    }

    fn request(min_nodes: usize, model_gb: u64) -> PlacementRequest {
        PlacementRequest {
            model_id: "test-model".to_string(),
            model_size_bytes: model_gb * GB,
            hidden_size: 768,
            sharding: Sharding::Pipeline,
            min_nodes,
            required_nodes: None,
            prefer_rdma: false,
        }
    }

    fn ring(names: &[&str], metrics: LinkMetrics) -> Topology {
        let mut topo = Topology::new();
        for pair in names.windows(2) {
            topo.add_link(pair[0], pair[1], metrics.clone());
        }
        topo.add_link(*names.last().unwrap(), names[0], metrics);
        topo
    }

    #[test]
    fn test_min_nodes_excludes_small_cycles() {
        // A 4-ring plus a separate connected pair: with min_nodes=3 only
        // the 4-cycle qualifies even though the pair is cheaper.
        let mut topo = ring(&["a", "b", "c", "d"], LinkMetrics::ethernet(1.0, 10.0));
        topo.add_link("x", "y", LinkMetrics::ethernet(1.0, 10.0));

        let node_memory = memory(&["a", "b", "c", "d", "x", "y"], 16);
        let cycle = select_cycle(
            &topo,
            &node_memory,
            &request(3, 8),
            &PlacementConfig::default(),
        )
        .unwrap();

        assert_eq!(cycle.len(), 4);
        assert!(!cycle.contains("x"));
    }

    #[test]
    fn test_insufficient_memory_is_no_feasible_cycle() {
        let topo = ring(&["a", "b", "c"], LinkMetrics::ethernet(1.0, 10.0));
        let node_memory = memory(&["a", "b", "c"], 4); // 12GB across the cycle

        let result = select_cycle(
            &topo,
            &node_memory,
            &request(2, 64),
            &PlacementConfig::default(),
        );
        assert!(matches!(result, Err(PlacementError::NoFeasibleCycle(_))));
    }

    #[test]
    fn test_tensor_divisibility() {
        // hidden_size 768: a 5-ring is rejected, a 4-ring accepted.
        let five = ring(&["a", "b", "c", "d", "e"], LinkMetrics::ethernet(1.0, 10.0));
        let node_memory = memory(&["a", "b", "c", "d", "e"], 16);

        let mut req = request(5, 8);
        req.sharding = Sharding::Tensor;

        let result = select_cycle(&five, &node_memory, &req, &PlacementConfig::default());
        assert!(matches!(result, Err(PlacementError::NoFeasibleCycle(_))));

        let four = ring(&["a", "b", "c", "d"], LinkMetrics::ethernet(1.0, 10.0));
        let mut req = request(4, 8);
        req.sharding = Sharding::Tensor;
        let cycle = select_cycle(&four, &memory(&["a", "b", "c", "d"], 16), &req, &PlacementConfig::default()).unwrap();
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_required_nodes_subset() {
        let mut topo = ring(&["a", "b", "c"], LinkMetrics::ethernet(1.0, 10.0));
        topo.add_link("x", "y", LinkMetrics::ethernet(1.0, 10.0));
        let node_memory = memory(&["a", "b", "c", "x", "y"], 16);

        let mut req = request(2, 8);
        req.required_nodes = Some(BTreeSet::from(["c".to_string()]));

        let cycle = select_cycle(&topo, &node_memory, &req, &PlacementConfig::default()).unwrap();
        assert!(cycle.contains("c"));
    }

    #[test]
    fn test_rdma_preference_restricts_when_attainable() {
        // Two disjoint pairs, one RDMA, one ethernet with more RAM. The
        // RDMA preference wins over the memory tie-break.
        let mut topo = Topology::new();
        topo.add_link("a", "b", LinkMetrics::rdma(0.01, 100.0));
        topo.add_link("c", "d", LinkMetrics::ethernet(1.0, 10.0));

        let mut node_memory = memory(&["a", "b"], 16);
        node_memory.extend(memory(&["c", "d"], 64));

        let mut req = request(2, 8);
        req.prefer_rdma = true;
        let cycle = select_cycle(&topo, &node_memory, &req, &PlacementConfig::default()).unwrap();
        assert!(cycle.contains("a") && cycle.contains("b"));

        // Without the preference the larger-memory pair wins.
        req.prefer_rdma = false;
        let cycle = select_cycle(&topo, &node_memory, &req, &PlacementConfig::default()).unwrap();
        assert!(cycle.contains("c") && cycle.contains("d"));
    }

    #[test]
    fn test_leaf_node_preference() {
        // Triangle a-b-c plus leaf e hanging off c: both the triangle and
        // pair (c,e) seat 2+ nodes; with min_nodes=2 the smallest cycles
        // are the pairs, and pairs containing leaf e are preferred.
        let mut topo = ring(&["a", "b", "c"], LinkMetrics::ethernet(1.0, 10.0));
        topo.add_link("c", "e", LinkMetrics::ethernet(1.0, 10.0));
        let node_memory = memory(&["a", "b", "c", "e"], 16);

        let cycle = select_cycle(
            &topo,
            &node_memory,
            &request(2, 8),
            &PlacementConfig::default(),
        )
        .unwrap();
        assert!(cycle.contains("e"));
    }

    #[test]
    fn test_single_node_when_min_nodes_is_one() {
        // With min_nodes=1 a lone node hosts the whole model; the
        // singleton beats the pair on cycle size.
        let mut topo = Topology::new();
        topo.add_link("a", "b", LinkMetrics::ethernet(1.0, 10.0));
        let node_memory = memory(&["a", "b"], 32);

        let cycle = select_cycle(
            &topo,
            &node_memory,
            &request(1, 8),
            &PlacementConfig::default(),
        )
        .unwrap();
        assert_eq!(cycle.len(), 1);
    }

    #[test]
    fn test_tie_break_by_available_ram() {
        let mut topo = Topology::new();
        topo.add_link("a", "b", LinkMetrics::ethernet(1.0, 10.0));
        topo.add_link("c", "d", LinkMetrics::ethernet(1.0, 10.0));

        let mut node_memory = memory(&["a", "b"], 8);
        node_memory.extend(memory(&["c", "d"], 32));

        let cycle = select_cycle(
            &topo,
            &node_memory,
            &request(2, 8),
            &PlacementConfig::default(),
        )
        .unwrap();
        assert!(cycle.contains("c") && cycle.contains("d"));
    }
}
