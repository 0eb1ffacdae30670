use crate::error::{Error, Result};
use crate::market::types::{AgentId, ConvergenceStatus, PassStats, Price, ResourceId, ResourceKey};
use crate::market::Config as MarketConfig;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Road distance between parking keys: `distances[destination][parking]`
pub type DistanceMatrix = BTreeMap<ResourceKey, BTreeMap<ResourceKey, f64>>;

/// Input snapshot of one allocation cycle, supplied by the simulator layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleInput {
    /// Vehicle → key of the parking it was originally heading to
    pub agents: BTreeMap<AgentId, ResourceKey>,
    /// Free units per key; each unit becomes one auction
    pub capacities: BTreeMap<ResourceKey, u32>,
    pub starting_prices: BTreeMap<ResourceKey, Price>,
    pub distances: DistanceMatrix,
    /// Per-vehicle budget overriding `max_reservation_price`
    #[serde(default)]
    pub reservations: BTreeMap<AgentId, Price>,
    /// Per-vehicle β overriding the sampled weight
    #[serde(default)]
    pub weights: BTreeMap<AgentId, f64>,
}

impl CycleInput {
    pub fn with_agent(mut self, agent: impl Into<String>, destination: impl Into<String>) -> Self {
        self.agents.insert(AgentId::new(agent), ResourceKey::new(destination));
        self
    }

    pub fn with_parking(
        mut self,
        key: impl Into<String>,
        capacity: u32,
        starting_price: Price,
    ) -> Self {
        let key = ResourceKey::new(key);
        self.capacities.insert(key.clone(), capacity);
        self.starting_prices.insert(key, starting_price);
        self
    }

    pub fn with_distance(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        distance: f64,
    ) -> Self {
        self.distances
            .entry(ResourceKey::new(from))
            .or_default()
            .insert(ResourceKey::new(to), distance);
        self
    }

    pub fn with_reservation(mut self, agent: impl Into<String>, value: Price) -> Self {
        self.reservations.insert(AgentId::new(agent), value);
        self
    }

    pub fn with_weight(mut self, agent: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(AgentId::new(agent), weight);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightOutcome {
    pub value: f64,
    pub probability: f64,
}

/// Source of the price/distance trade-off β assigned to each vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightDistribution {
    Fixed(f64),
    Discrete(Vec<WeightOutcome>),
}

impl Default for WeightDistribution {
    fn default() -> Self {
        Self::Fixed(0.5)
    }
}

impl WeightDistribution {
    pub fn sampler(&self) -> Result<WeightSampler> {
        match self {
            Self::Fixed(value) => {
                check_weight(*value)?;
                Ok(WeightSampler::Fixed(*value))
            }
            Self::Discrete(outcomes) => {
                for outcome in outcomes {
                    check_weight(outcome.value)?;
                }
                let index = WeightedIndex::new(outcomes.iter().map(|o| o.probability))
                    .map_err(|e| Error::InvalidDistribution(e.to_string()))?;
                Ok(WeightSampler::Discrete {
                    values: outcomes.iter().map(|o| o.value).collect(),
                    index,
                })
            }
        }
    }
}

/// Validated form of a [`WeightDistribution`]
#[derive(Debug, Clone)]
pub enum WeightSampler {
    Fixed(f64),
    Discrete { values: Vec<f64>, index: WeightedIndex<f64> },
}

impl WeightSampler {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Fixed(value) => *value,
            Self::Discrete { values, index } => values[index.sample(rng)],
        }
    }
}

pub(crate) fn check_weight(value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidWeight(value))
    }
}

/// Everything needed to run a cycle besides the input snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub market: MarketConfig,
    /// Budget of vehicles without an explicit reservation value
    pub max_reservation_price: Price,
    pub weight: WeightDistribution,
    /// Seed of the single random source used for weight sampling
    pub seed: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            max_reservation_price: 1000.0,
            weight: WeightDistribution::default(),
            seed: 0,
        }
    }
}

impl CycleConfig {
    pub fn with_market(mut self, market: MarketConfig) -> Self {
        self.market = market;
        self
    }

    pub fn with_max_reservation_price(mut self, price: Price) -> Self {
        self.max_reservation_price = price;
        self
    }

    pub fn with_weight(mut self, weight: WeightDistribution) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Parking unit won by a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub key: ResourceKey,
    pub resource: ResourceId,
    pub price: Price,
}

/// Output of one allocation cycle, consumed by the simulator layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub awards: BTreeMap<AgentId, Award>,
    /// Vehicles that left without a unit: out of budget or nothing left
    pub unallocated: BTreeSet<AgentId>,
    pub status: ConvergenceStatus,
    pub passes: Vec<PassStats>,
}

impl AllocationResult {
    pub fn rounds(&self) -> u64 {
        self.passes.iter().map(|p| p.rounds).sum()
    }

    pub fn award(&self, agent: &AgentId) -> Option<&Award> {
        self.awards.get(agent)
    }

    pub fn is_converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fixed_weight_sampler() {
        let sampler = WeightDistribution::Fixed(0.3).sampler().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.sample(&mut rng), 0.3);
        assert_eq!(
            WeightDistribution::Fixed(1.5).sampler().unwrap_err(),
            Error::InvalidWeight(1.5)
        );
    }

    #[test]
    fn test_discrete_sampler_only_yields_listed_values() {
        let dist = WeightDistribution::Discrete(vec![
            WeightOutcome { value: 0.2, probability: 0.25 },
            WeightOutcome { value: 0.8, probability: 0.75 },
        ]);
        let sampler = dist.sampler().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let w = sampler.sample(&mut rng);
            assert!(w == 0.2 || w == 0.8);
        }
    }

    #[test]
    fn test_discrete_sampler_rejects_bad_probabilities() {
        let empty = WeightDistribution::Discrete(vec![]);
        assert!(matches!(empty.sampler(), Err(Error::InvalidDistribution(_))));

        let negative =
            WeightDistribution::Discrete(vec![WeightOutcome { value: 0.5, probability: -1.0 }]);
        assert!(matches!(negative.sampler(), Err(Error::InvalidDistribution(_))));
    }

    #[test]
    fn test_weight_distribution_json_forms() {
        let fixed: WeightDistribution = serde_json::from_str("0.25").unwrap();
        assert_eq!(fixed, WeightDistribution::Fixed(0.25));

        let discrete: WeightDistribution =
            serde_json::from_str(r#"[{"value": 0.1, "probability": 1.0}]"#).unwrap();
        assert_eq!(
            discrete,
            WeightDistribution::Discrete(vec![WeightOutcome { value: 0.1, probability: 1.0 }])
        );
    }

    #[test]
    fn test_cycle_config_defaults_fill_missing_fields() {
        let json = r#"{"seed": 9, "market": {"bid_increment": 2.5}}"#;
        let config: CycleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.market.bid_increment, 2.5);
        assert_eq!(config.market.max_silent_rounds, 15);
        assert_eq!(config.max_reservation_price, 1000.0);
    }
}
