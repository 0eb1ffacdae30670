use super::types::DistanceMatrix;
use crate::market::types::{AgentId, ResourceKey};
use std::collections::BTreeMap;
use tracing::debug;

/// Baseline without prices: each vehicle, in id order, is sent to the closest
/// parking that still has a free unit. Ties go to the lowest key.
pub fn nearest_free(
    agents: &BTreeMap<AgentId, ResourceKey>,
    free: &BTreeMap<ResourceKey, u32>,
    distances: &DistanceMatrix,
) -> BTreeMap<AgentId, ResourceKey> {
    let mut remaining = free.clone();
    let mut guidance = BTreeMap::new();

    for (agent, destination) in agents {
        let Some(row) = distances.get(destination) else {
            continue;
        };
        let mut best: Option<(&ResourceKey, f64)> = None;
        for (key, &distance) in row {
            if remaining.get(key).copied().unwrap_or(0) == 0 {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((key, distance));
            }
        }

        match best {
            Some((key, _)) => {
                if let Some(units) = remaining.get_mut(key) {
                    *units -= 1;
                }
                guidance.insert(agent.clone(), key.clone());
            }
            None => debug!("No free parking reachable for {}", agent),
        }
    }
    guidance
}
