//! Caller-owned parking state carried between allocation cycles.
//!
//! The engine never touches this state; the simulator loop feeds occupancy in,
//! asks for free capacity, and applies each cycle's result through a
//! [`StopPlanner`] that may refuse individual reroutes.

use super::types::{AllocationResult, Award};
use crate::error::{Error, Result};
use crate::market::types::{AgentId, Price, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Boundary to the simulator: reroutes a vehicle to its awarded parking.
pub trait StopPlanner {
    fn replace_stop(&mut self, agent: &AgentId, key: &ResourceKey) -> Result<()>;
}

impl<F> StopPlanner for F
where
    F: FnMut(&AgentId, &ResourceKey) -> Result<()>,
{
    fn replace_stop(&mut self, agent: &AgentId, key: &ResourceKey) -> Result<()> {
        self(agent, key)
    }
}

/// What happened when a vehicle finally parked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub agent: AgentId,
    pub parked_key: ResourceKey,
    pub reserved_key: Option<ResourceKey>,
    pub auction_price: Option<Price>,
    /// Auction price when parked where reserved, otherwise the key's starting price
    pub paid_price: Price,
    pub occupied_reserved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParkingContext {
    capacities: BTreeMap<ResourceKey, u32>,
    occupancy: BTreeMap<ResourceKey, u32>,
    reservations: BTreeMap<ResourceKey, u32>,
    controlled: BTreeMap<AgentId, Award>,
}

impl ParkingContext {
    pub fn new(capacities: BTreeMap<ResourceKey, u32>) -> Self {
        Self { capacities, ..Default::default() }
    }

    pub fn observe_occupancy(&mut self, key: &ResourceKey, occupied: u32) -> Result<()> {
        if !self.capacities.contains_key(key) {
            return Err(Error::ConfigurationError(format!("unknown parking {key}")));
        }
        self.occupancy.insert(key.clone(), occupied);
        Ok(())
    }

    /// Capacity left after occupancy and outstanding reservations, floored at zero.
    pub fn free_capacities(&self) -> BTreeMap<ResourceKey, u32> {
        self.capacities
            .iter()
            .map(|(key, &capacity)| {
                let occupied = self.occupancy.get(key).copied().unwrap_or(0);
                let reserved = self.reservations(key);
                (key.clone(), capacity.saturating_sub(occupied).saturating_sub(reserved))
            })
            .collect()
    }

    pub fn reservations(&self, key: &ResourceKey) -> u32 {
        self.reservations.get(key).copied().unwrap_or(0)
    }

    pub fn controlled(&self) -> &BTreeMap<AgentId, Award> {
        &self.controlled
    }

    pub fn is_controlled(&self, agent: &AgentId) -> bool {
        self.controlled.contains_key(agent)
    }

    /// Reroutes every winner; a refused reroute leaves no reservation behind.
    ///
    /// Returns the vehicles that were actually rerouted.
    pub fn apply<P: StopPlanner>(
        &mut self,
        result: &AllocationResult,
        planner: &mut P,
    ) -> Vec<AgentId> {
        let mut applied = Vec::new();
        for (agent, award) in &result.awards {
            match planner.replace_stop(agent, &award.key) {
                Ok(()) => {
                    *self.reservations.entry(award.key.clone()).or_default() += 1;
                    self.controlled.insert(agent.clone(), award.clone());
                    applied.push(agent.clone());
                }
                Err(e) => warn!("Dropping award of {} at {}: {}", agent, award.key, e),
            }
        }
        info!("Applied {} of {} awards", applied.len(), result.awards.len());
        applied
    }

    /// Releases the vehicle's reservation and settles what it paid.
    pub fn record_arrival(
        &mut self,
        agent: &AgentId,
        parked_key: &ResourceKey,
        starting_prices: &BTreeMap<ResourceKey, Price>,
    ) -> Result<Arrival> {
        let list_price = *starting_prices
            .get(parked_key)
            .ok_or_else(|| Error::MissingStartingPrice(parked_key.0.clone()))?;

        let Some(award) = self.controlled.remove(agent) else {
            return Ok(Arrival {
                agent: agent.clone(),
                parked_key: parked_key.clone(),
                reserved_key: None,
                auction_price: None,
                paid_price: list_price,
                occupied_reserved: false,
            });
        };

        if let Some(count) = self.reservations.get_mut(&award.key) {
            *count = count.saturating_sub(1);
        }
        let occupied_reserved = award.key == *parked_key;
        Ok(Arrival {
            agent: agent.clone(),
            parked_key: parked_key.clone(),
            reserved_key: Some(award.key),
            auction_price: Some(award.price),
            paid_price: if occupied_reserved { award.price } else { list_price },
            occupied_reserved,
        })
    }
}

/// Drops keys without free units so the map can feed a cycle directly.
pub fn available_units(capacities: &BTreeMap<ResourceKey, u32>) -> BTreeMap<ResourceKey, u32> {
    capacities
        .iter()
        .filter(|(_, units)| **units > 0)
        .map(|(key, &units)| (key.clone(), units))
        .collect()
}
