//! One allocation cycle: validate the snapshot, expand capacity into
//! single-unit auctions, run the market and map sales back to vehicles.

use super::types::{check_weight, AllocationResult, Award, CycleConfig, CycleInput};
use crate::error::{Error, Result};
use crate::market::types::{AgentId, ResourceId, ResourceKey, Sale};
use crate::market::{Market, Offer, Participant};
use crate::market_info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A validated cycle, ready to run
#[derive(Debug, Clone)]
pub struct AllocationCycle {
    market: Market,
    participants: Vec<Participant>,
    offers: Vec<Offer>,
}

impl AllocationCycle {
    /// Validates `input` against `config`. Nothing runs if this fails.
    pub fn new(input: &CycleInput, config: &CycleConfig) -> Result<Self> {
        let market = Market::new(config.market.clone())?;
        validate(input, config)?;

        let sampler = config.weight.sampler()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let participants = input
            .agents
            .iter()
            .map(|(agent, destination)| {
                let weight = match input.weights.get(agent) {
                    Some(&w) => w,
                    None => sampler.sample(&mut rng),
                };
                let reservation = input
                    .reservations
                    .get(agent)
                    .copied()
                    .unwrap_or(config.max_reservation_price);
                // Only keys that are actually on offer are worth a distance entry.
                let distances: BTreeMap<ResourceKey, f64> = input
                    .distances
                    .get(destination)
                    .into_iter()
                    .flatten()
                    .filter(|(key, _)| input.capacities.contains_key(*key))
                    .map(|(key, d)| (key.clone(), *d))
                    .collect();
                Participant { id: agent.clone(), reservation, weight, distances }
            })
            .collect();

        Ok(Self { market, participants, offers: expand_offers(input) })
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    /// Runs the market and maps its sales back to vehicles.
    ///
    /// Fails if the market ever sold two units to the same vehicle.
    pub fn run(&self) -> Result<AllocationResult> {
        market_info!(
            "Allocation cycle: {} vehicles, {} units, increment {}",
            self.participants.len(),
            self.offers.len(),
            self.market.config().bid_increment
        );
        let outcome = self.market.run(&self.participants, &self.offers);

        Ok(AllocationResult {
            awards: collect_awards(outcome.sales)?,
            unallocated: outcome.unallocated,
            status: outcome.status,
            passes: outcome.passes,
        })
    }
}

fn collect_awards(sales: Vec<Sale>) -> Result<BTreeMap<AgentId, Award>> {
    let mut awards = BTreeMap::new();
    for sale in sales {
        let award = Award { key: sale.key, resource: sale.resource, price: sale.price };
        match awards.entry(sale.winner) {
            Entry::Vacant(slot) => {
                slot.insert(award);
            }
            Entry::Occupied(slot) => {
                return Err(Error::DuplicateAward {
                    agent: slot.key().0.clone(),
                    first: slot.get().resource.to_string(),
                    second: award.resource.to_string(),
                });
            }
        }
    }
    Ok(awards)
}

/// Validates and runs a cycle in one call.
pub fn allocate(input: &CycleInput, config: &CycleConfig) -> Result<AllocationResult> {
    AllocationCycle::new(input, config)?.run()
}

/// One offer per capacity unit, numbered in key order.
fn expand_offers(input: &CycleInput) -> Vec<Offer> {
    let mut offers = Vec::new();
    for (key, &capacity) in &input.capacities {
        let Some(&starting_price) = input.starting_prices.get(key) else {
            continue;
        };
        for _ in 0..capacity {
            offers.push(Offer {
                id: ResourceId(offers.len() as u32),
                key: key.clone(),
                starting_price,
            });
        }
    }
    offers
}

fn validate(input: &CycleInput, config: &CycleConfig) -> Result<()> {
    check_reservation("default", config.max_reservation_price)?;

    for (key, &capacity) in &input.capacities {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { key: key.0.clone(), capacity });
        }
        let price = *input
            .starting_prices
            .get(key)
            .ok_or_else(|| Error::MissingStartingPrice(key.0.clone()))?;
        if !(price.is_finite() && price >= 0.0) {
            return Err(Error::InvalidPrice { key: key.0.clone(), price });
        }
    }

    for (from, row) in &input.distances {
        for (to, &distance) in row {
            if !(distance.is_finite() && distance >= 0.0) {
                return Err(Error::InvalidDistance {
                    from: from.0.clone(),
                    to: to.0.clone(),
                    distance,
                });
            }
        }
    }

    for (agent, destination) in &input.agents {
        if !input.distances.contains_key(destination) {
            return Err(Error::UnknownResourceKey {
                agent: agent.0.clone(),
                key: destination.0.clone(),
            });
        }
    }

    for (agent, &value) in &input.reservations {
        if !input.agents.contains_key(agent) {
            return Err(Error::UnknownAgent(agent.0.clone()));
        }
        check_reservation(&agent.0, value)?;
    }

    for (agent, &weight) in &input.weights {
        if !input.agents.contains_key(agent) {
            return Err(Error::UnknownAgent(agent.0.clone()));
        }
        check_weight(weight)?;
    }

    Ok(())
}

fn check_reservation(agent: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidReservation { agent: agent.to_string(), value })
    }
}
