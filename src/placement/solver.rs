use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PlacementConfig;
use crate::errors::{PlacementError, Result};
use crate::placement::{ShardSpec, Sharding};
use crate::scoring::DeviceScore;
use crate::DeviceId;

/// One device offered to the solver: identity, memory budget, and its
/// suitability score for this placement attempt.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub device_id: DeviceId,
    pub memory_available_bytes: u64,
    pub score: DeviceScore,
}

/// Outcome of one backtracking descent.
enum Search {
    Found,
    Exhausted,
    TimedOut,
}

/// CSP shard placement solver.
///
/// Backtracking search with constraint propagation over the domain of
/// feasible devices per shard, ordered most-preferred first. Bounded by
/// a depth limit and a wall-clock deadline checked at every step; any
/// exhaustion routes to the greedy fallback, so the solver either
/// returns a complete memory-respecting assignment or
/// `NoValidPlacement`.
pub struct PlacementSolver {
    config: PlacementConfig,
}

impl PlacementSolver {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    /// Assign every shard to a device.
    ///
    /// The returned map is total over the shard indices; partial
    /// assignments are never returned.
    pub fn solve(
        &self,
        shards: &[ShardSpec],
        candidates: &[DeviceCandidate],
        sharding: Sharding,
    ) -> Result<BTreeMap<usize, DeviceId>> {
        if shards.is_empty() {
            return Err(PlacementError::InvalidRequest(
                "no shards to place".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Err(PlacementError::InvalidRequest(
                "no devices available for placement".to_string(),
            ));
        }
        // Shard index doubles as the slice position throughout the
        // search, so the specs must arrive as 0..len in order.
        if shards.iter().enumerate().any(|(position, shard)| shard.index != position) {
            return Err(PlacementError::InvalidRequest(
                "shard indices must run 0..len in order".to_string(),
            ));
        }

        let memory_by_device: HashMap<&str, u64> = candidates
            .iter()
            .map(|c| (c.device_id.as_str(), c.memory_available_bytes))
            .collect();

        let domains = self.initial_domains(shards, candidates);
        let all_nonempty = domains.values().all(|d| !d.is_empty());

        let assignment = if all_nonempty {
            let mut assignment = BTreeMap::new();
            let mut domains = domains;
            let deadline = Instant::now() + self.config.csp_timeout;
            match self.backtrack(
                &mut assignment,
                &mut domains,
                shards,
                &memory_by_device,
                sharding,
                deadline,
                0,
            ) {
                Search::Found => {
                    info!(shards = shards.len(), "CSP search found placement");
                    assignment
                }
                Search::Exhausted => {
                    warn!("CSP search exhausted, falling back to greedy placement");
                    self.greedy(shards, candidates, sharding)
                }
                Search::TimedOut => {
                    warn!(
                        timeout_ms = self.config.csp_timeout.as_millis() as u64,
                        "CSP search timed out, falling back to greedy placement"
                    );
                    self.greedy(shards, candidates, sharding)
                }
            }
        } else {
            // Some shard fits on no device by itself; the CSP cannot
            // succeed, so go straight to the degrading fallback.
            warn!("Empty initial domain, falling back to greedy placement");
            self.greedy(shards, candidates, sharding)
        };

        validate_assignment(&assignment, shards, &memory_by_device, sharding)?;
        Ok(assignment)
    }

    /// Initial domain per shard: devices whose available memory covers
    /// the shard, ordered by descending composite score.
    fn initial_domains(
        &self,
        shards: &[ShardSpec],
        candidates: &[DeviceCandidate],
    ) -> BTreeMap<usize, Vec<DeviceId>> {
        let mut ordered: Vec<&DeviceCandidate> = candidates.iter().collect();
        ordered.sort_by(|a, b| {
            b.score
                .composite
                .partial_cmp(&a.score.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        shards
            .iter()
            .map(|shard| {
                let feasible: Vec<DeviceId> = ordered
                    .iter()
                    .filter(|c| c.memory_available_bytes >= shard.size_bytes)
                    .map(|c| c.device_id.clone())
                    .collect();
                if feasible.is_empty() {
                    debug!(shard = shard.index, size = shard.size_bytes, "Shard has empty domain");
                }
                (shard.index, feasible)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn backtrack(
        &self,
        assignment: &mut BTreeMap<usize, DeviceId>,
        domains: &mut BTreeMap<usize, Vec<DeviceId>>,
        shards: &[ShardSpec],
        memory_by_device: &HashMap<&str, u64>,
        sharding: Sharding,
        deadline: Instant,
        depth: usize,
    ) -> Search {
        // Checked every step so a cancelled or over-budget search
        // returns promptly instead of stalling the scheduler.
        if Instant::now() >= deadline {
            return Search::TimedOut;
        }
        if depth > self.config.max_backtrack_depth {
            debug!(depth, "Backtracking depth limit reached");
            return Search::Exhausted;
        }

        if assignment.len() == domains.len() {
            return Search::Found;
        }

        // Minimum-remaining-values: the most constrained shard first,
        // ties broken by shard index (BTreeMap iteration order).
        let shard_index = domains
            .iter()
            .filter(|(i, _)| !assignment.contains_key(*i))
            .min_by_key(|(_, domain)| domain.len())
            .map(|(i, _)| *i)
            .expect("unassigned shard exists");

        let domain = domains[&shard_index].clone();
        for device_id in domain {
            assignment.insert(shard_index, device_id.clone());
            let saved_domains = domains.clone();

            if self.propagate(
                assignment,
                domains,
                shard_index,
                &device_id,
                shards,
                memory_by_device,
                sharding,
            ) {
                match self.backtrack(
                    assignment,
                    domains,
                    shards,
                    memory_by_device,
                    sharding,
                    deadline,
                    depth + 1,
                ) {
                    Search::Found => return Search::Found,
                    Search::TimedOut => return Search::TimedOut,
                    Search::Exhausted => {}
                }
            }

            assignment.remove(&shard_index);
            *domains = saved_domains;
        }

        Search::Exhausted
    }

    /// Propagate constraints after tentatively assigning a shard.
    ///
    /// Returns false on a violation, which triggers a backtrack rather
    /// than an error: failed propagation is an expected search state.
    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &self,
        assignment: &BTreeMap<usize, DeviceId>,
        domains: &mut BTreeMap<usize, Vec<DeviceId>>,
        assigned_shard: usize,
        assigned_device: &str,
        shards: &[ShardSpec],
        memory_by_device: &HashMap<&str, u64>,
        sharding: Sharding,
    ) -> bool {
        // Running memory total for the device across everything assigned
        // so far.
        let device_total: u64 = assignment
            .iter()
            .filter(|(_, d)| d.as_str() == assigned_device)
            .map(|(i, _)| shards[*i].size_bytes)
            .sum();
        let available = memory_by_device.get(assigned_device).copied().unwrap_or(0);
        if device_total > available {
            return false;
        }

        // Pipeline stages run one per device; tensor shards of a split
        // layer may legitimately share one.
        if sharding == Sharding::Pipeline {
            for (shard_index, domain) in domains.iter_mut() {
                if *shard_index == assigned_shard || assignment.contains_key(shard_index) {
                    continue;
                }
                domain.retain(|d| d != assigned_device);
                if domain.is_empty() {
                    return false;
                }
            }
        }

        true
    }

    /// Greedy fallback: most memory-constrained shards first, devices by
    /// descending composite score with remaining-capacity tracking. In
    /// pipeline mode already-used devices are skipped while unused ones
    /// remain.
    ///
    /// When nothing fits a shard it degrades gracefully: the best
    /// remaining device is assigned anyway and the violation is logged;
    /// the final validation in `solve` decides whether the result
    /// stands. Never backtracks, always terminates.
    fn greedy(
        &self,
        shards: &[ShardSpec],
        candidates: &[DeviceCandidate],
        sharding: Sharding,
    ) -> BTreeMap<usize, DeviceId> {
        let mut ordered: Vec<&DeviceCandidate> = candidates.iter().collect();
        ordered.sort_by(|a, b| {
            b.score
                .composite
                .partial_cmp(&a.score.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        let mut remaining: HashMap<&str, u64> = candidates
            .iter()
            .map(|c| (c.device_id.as_str(), c.memory_available_bytes))
            .collect();
        let mut used: HashSet<&str> = HashSet::new();

        let mut shard_order: Vec<&ShardSpec> = shards.iter().collect();
        shard_order.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(a.index.cmp(&b.index)));

        let mut assignment = BTreeMap::new();
        for shard in shard_order {
            let eligible = |c: &&&DeviceCandidate| {
                sharding != Sharding::Pipeline || !used.contains(c.device_id.as_str())
            };
            let fit = ordered
                .iter()
                .filter(eligible)
                .find(|c| remaining[c.device_id.as_str()] >= shard.size_bytes);

            let chosen = match fit {
                Some(c) => *c,
                None => {
                    let forced = ordered
                        .iter()
                        .find(eligible)
                        .or_else(|| ordered.first())
                        .expect("candidates non-empty");
                    warn!(
                        shard = shard.index,
                        size = shard.size_bytes,
                        device_id = %forced.device_id,
                        "No device fits shard; forcing best remaining device"
                    );
                    *forced
                }
            };

            let entry = remaining
                .get_mut(chosen.device_id.as_str())
                .expect("device tracked");
            *entry = entry.saturating_sub(shard.size_bytes);
            used.insert(chosen.device_id.as_str());
            assignment.insert(shard.index, chosen.device_id.clone());
        }

        debug!(assignment = ?assignment, "Greedy placement complete");
        assignment
    }
}

/// Check the invariants over a complete assignment: for every device the
/// sum of assigned shard sizes fits its available memory, and pipeline
/// stages never share a device.
fn validate_assignment(
    assignment: &BTreeMap<usize, DeviceId>,
    shards: &[ShardSpec],
    memory_by_device: &HashMap<&str, u64>,
    sharding: Sharding,
) -> Result<()> {
    if assignment.len() != shards.len() {
        return Err(PlacementError::NoValidPlacement(format!(
            "assigned {} of {} shards",
            assignment.len(),
            shards.len()
        )));
    }

    let mut usage: HashMap<&str, u64> = HashMap::new();
    let mut shard_counts: HashMap<&str, usize> = HashMap::new();
    for (shard_index, device_id) in assignment {
        *usage.entry(device_id.as_str()).or_insert(0) += shards[*shard_index].size_bytes;
        *shard_counts.entry(device_id.as_str()).or_insert(0) += 1;
    }

    for (device_id, used) in usage {
        let available = memory_by_device.get(device_id).copied().unwrap_or(0);
        if used > available {
            return Err(PlacementError::NoValidPlacement(format!(
                "device {device_id} overallocated: {used} > {available} bytes"
            )));
        }
    }

    if sharding == Sharding::Pipeline {
        if let Some((device_id, count)) = shard_counts.iter().find(|(_, count)| **count > 1) {
            return Err(PlacementError::NoValidPlacement(format!(
                "device {device_id} holds {count} pipeline stages"
            )));
        }
    }

    Ok(())
}
