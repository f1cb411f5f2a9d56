//! Batch workload distribution across a set of devices.
//!
//! Splits already-placed work items (inference requests, batch entries)
//! across the devices of an instance, either uniformly or in proportion
//! to per-device capacity weights.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::errors::{PlacementError, Result};
use crate::DeviceId;

/// Split `items` into `devices.len()` contiguous near-equal chunks.
///
/// The division remainder goes to the first devices in the given order.
/// With `max_per_device` set, each chunk is capped and surplus items are
/// left unassigned. Empty devices or items yield an empty distribution.
pub fn distribute_uniform<T: Clone>(
    devices: &[DeviceId],
    items: &[T],
    max_per_device: Option<usize>,
) -> BTreeMap<DeviceId, Vec<T>> {
    let mut distribution: BTreeMap<DeviceId, Vec<T>> =
        devices.iter().map(|d| (d.clone(), Vec::new())).collect();

    if devices.is_empty() || items.is_empty() {
        return distribution;
    }

    let per_device = items.len() / devices.len();
    let remainder = items.len() % devices.len();

    let mut item_idx = 0;
    for (i, device_id) in devices.iter().enumerate() {
        let mut count = per_device + usize::from(i < remainder);
        if let Some(cap) = max_per_device {
            count = count.min(cap);
        }
        count = count.min(items.len() - item_idx);

        distribution.insert(device_id.clone(), items[item_idx..item_idx + count].to_vec());
        item_idx += count;
    }

    if item_idx < items.len() {
        debug!(
            unassigned = items.len() - item_idx,
            "Per-device cap left items unassigned"
        );
    }
    distribution
}

/// Distribute `items` in proportion to per-device capacity weights.
///
/// Each device receives `round(len * weight / total)` items, at least 1
/// while it has positive weight and items remain. Rounding leftovers go
/// to the device with the largest weight. Device ids are visited in
/// sorted order so the split is deterministic.
pub fn distribute_by_capacity<T: Clone>(
    capacities: &HashMap<DeviceId, f64>,
    items: &[T],
) -> Result<BTreeMap<DeviceId, Vec<T>>> {
    for (device_id, weight) in capacities {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(PlacementError::InvalidCapacity(format!(
                "device {device_id} has invalid capacity weight {weight}"
            )));
        }
    }

    let total: f64 = capacities.values().sum();
    if !capacities.is_empty() && total == 0.0 {
        return Err(PlacementError::InvalidCapacity(
            "all capacity weights are zero".to_string(),
        ));
    }

    let mut distribution: BTreeMap<DeviceId, Vec<T>> = capacities
        .keys()
        .map(|d| (d.clone(), Vec::new()))
        .collect();

    if items.is_empty() || capacities.is_empty() {
        return Ok(distribution);
    }

    let mut ordered: Vec<&DeviceId> = capacities.keys().collect();
    ordered.sort();

    let mut item_idx = 0;
    for device_id in &ordered {
        let weight = capacities[*device_id];
        let remaining = items.len() - item_idx;
        if remaining == 0 {
            break;
        }

        let mut count = (items.len() as f64 * weight / total).round() as usize;
        if weight > 0.0 {
            count = count.max(1);
        }
        count = count.min(remaining);

        distribution.insert(
            (*device_id).clone(),
            items[item_idx..item_idx + count].to_vec(),
        );
        item_idx += count;
    }

    // Rounding leftovers go to the heaviest device; ties break on the
    // smaller id to stay deterministic.
    if item_idx < items.len() {
        let largest = ordered
            .iter()
            .max_by(|a, b| {
                capacities[**a]
                    .partial_cmp(&capacities[**b])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.cmp(a))
            })
            .expect("capacities non-empty");
        distribution
            .get_mut(*largest)
            .expect("device present")
            .extend_from_slice(&items[item_idx..]);
    }

    Ok(distribution)
}
