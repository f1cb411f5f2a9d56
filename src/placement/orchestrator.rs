use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PlacementConfig;
use crate::errors::{PlacementError, Result};
use crate::placement::{
    select_cycle, ClusterEvent, DeviceCandidate, Instance, InstanceId, NodeMemory,
    PlacementRequest, PlacementSolver, ShardSpec,
};
use crate::scoring::score_device;
use crate::telemetry::{aggregate_metrics, DeviceView};
use crate::topology::Topology;
use crate::NodeId;

/// Port reserved for the cluster control plane; instance coordinators
/// must never collide with it.
const CONTROL_PLANE_PORT: u16 = 52415;

/// Pick a coordinator port from the ephemeral range, stepping off the
/// control-plane port if the draw lands on it.
pub fn random_ephemeral_port() -> u16 {
    let port: u16 = rand::thread_rng().gen_range(49153..=65535);
    if port == CONTROL_PLANE_PORT {
        port - 1
    } else {
        port
    }
}

/// Place one model instance: select a cycle, shard the model, score the
/// cycle's devices, and solve the shard-to-device assignment.
///
/// Inputs are owned snapshots of cluster state taken by the caller, so
/// the decision runs against a consistent picture and the search can
/// move to a blocking worker without borrowing across await points.
pub async fn place_instance(
    request: PlacementRequest,
    topology: Topology,
    node_memory: HashMap<NodeId, NodeMemory>,
    device_views: Vec<DeviceView>,
    config: PlacementConfig,
) -> Result<Instance> {
    request.validate()?;

    let cycle = select_cycle(&topology, &node_memory, &request, &config)?;

    let cycle_views: Vec<DeviceView> = device_views
        .into_iter()
        .filter(|v| cycle.contains(&v.capability.node_id))
        .collect();
    if cycle_views.is_empty() {
        return Err(PlacementError::NoValidPlacement(
            "no devices have reported telemetry on the selected cycle".to_string(),
        ));
    }

    let shards = ShardSpec::split_even(request.model_size_bytes, cycle.len());
    let max_shard_bytes = shards
        .iter()
        .map(|s| s.size_bytes)
        .max()
        .unwrap_or(request.model_size_bytes);

    // Normalization references come from the candidate set, not the
    // whole cluster, so scores compare devices actually in contention.
    let cluster = aggregate_metrics(&cycle_views);
    let candidates: Vec<DeviceCandidate> = cycle_views
        .iter()
        .map(|view| DeviceCandidate {
            device_id: view.capability.device_id.clone(),
            memory_available_bytes: view.memory_available_bytes(),
            score: score_device(view, max_shard_bytes, &cluster, &config.score_weights),
        })
        .collect();
    debug!(
        candidates = candidates.len(),
        shards = shards.len(),
        "Scored placement candidates"
    );

    let sharding = request.sharding;
    let solver = PlacementSolver::new(config);
    let solver_shards = shards.clone();
    let assignments = tokio::task::spawn_blocking(move || {
        solver.solve(&solver_shards, &candidates, sharding)
    })
    .await
    .map_err(|e| PlacementError::Internal(format!("placement task failed: {e}")))??;

    let instance = Instance {
        instance_id: Uuid::new_v4(),
        model_id: request.model_id,
        sharding,
        topology: topology.subgraph(&cycle.node_ids),
        cycle,
        shards,
        assignments,
        coordinator_port: random_ephemeral_port(),
    };
    info!(
        instance_id = %instance.instance_id,
        model_id = %instance.model_id,
        nodes = instance.cycle.len(),
        port = instance.coordinator_port,
        "Placed instance"
    );
    Ok(instance)
}

/// Remove a placed instance, returning the deletion event to apply.
pub fn delete_instance(
    instances: &mut HashMap<InstanceId, Instance>,
    instance_id: InstanceId,
) -> Result<ClusterEvent> {
    let instance = instances
        .remove(&instance_id)
        .ok_or_else(|| PlacementError::InstanceNotFound(instance_id.to_string()))?;
    info!(instance_id = %instance_id, model_id = %instance.model_id, "Deleted instance");
    Ok(ClusterEvent::InstanceDeleted { instance_id })
}

/// Diff current against target instance state into the ordered event
/// list that transitions one into the other.
///
/// Deletions come before creations so freed capacity is visible to
/// whatever applies the events, and each group is ordered by instance id
/// for reproducibility.
pub fn transition_events(
    current: &HashMap<InstanceId, Instance>,
    target: &HashMap<InstanceId, Instance>,
) -> Vec<ClusterEvent> {
    let mut deleted: Vec<InstanceId> = current
        .keys()
        .filter(|id| !target.contains_key(id))
        .copied()
        .collect();
    deleted.sort();

    let mut created: Vec<&Instance> = target
        .values()
        .filter(|i| !current.contains_key(&i.instance_id))
        .collect();
    created.sort_by_key(|i| i.instance_id);

    deleted
        .into_iter()
        .map(|instance_id| ClusterEvent::InstanceDeleted { instance_id })
        .chain(created.into_iter().map(|instance| {
            ClusterEvent::InstanceCreated {
                instance: instance.clone(),
            }
        }))
        .collect()
}
