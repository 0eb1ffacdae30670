//! Round loop, convergence check and re-auction passes

use crate::error::{Error, Result};
use crate::market::auctioneer::Auctioneer;
use crate::market::bidder::{Bidder, within_budget};
use crate::market::cost::CostModel;
use crate::market::logging::log_pass;
use crate::market::types::{
    AgentId, ConvergenceStatus, PassStats, Price, ResourceId, ResourceKey, Sale,
};
use crate::market_info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Mechanism tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Step added to an auction's price on every accepted bid
    pub bid_increment: Price,
    /// Consecutive rounds without a bid after which an auction closes
    pub max_silent_rounds: u32,
    /// Optional hard cap on rounds per pass, below the derived bound
    pub max_rounds: Option<u64>,
    pub cost_model: CostModel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bid_increment: 10.0,
            max_silent_rounds: 15,
            max_rounds: None,
            cost_model: CostModel::Weighted,
        }
    }
}

impl Config {
    pub fn with_bid_increment(mut self, bid_increment: Price) -> Self {
        self.bid_increment = bid_increment;
        self
    }

    pub fn with_max_silent_rounds(mut self, rounds: u32) -> Self {
        self.max_silent_rounds = rounds;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u64) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bid_increment.is_finite() && self.bid_increment > 0.0) {
            return Err(Error::InvalidBidIncrement(self.bid_increment));
        }
        if self.max_silent_rounds == 0 {
            return Err(Error::ConfigurationError(
                "max_silent_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A vehicle entering the market
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: AgentId,
    pub reservation: Price,
    pub weight: f64,
    /// Distance to every resource key the vehicle would accept
    pub distances: BTreeMap<ResourceKey, f64>,
}

/// One unit of capacity offered for sale
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: ResourceId,
    pub key: ResourceKey,
    pub starting_price: Price,
}

/// Everything a full market run produced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub sales: Vec<Sale>,
    pub unallocated: BTreeSet<AgentId>,
    pub passes: Vec<PassStats>,
    pub status: ConvergenceStatus,
}

impl Outcome {
    pub fn rounds(&self) -> u64 {
        self.passes.iter().map(|p| p.rounds).sum()
    }
}

/// Drives synchronized auction rounds to a fixpoint and re-auctions leftovers.
#[derive(Debug, Clone)]
pub struct Market {
    config: Config,
}

impl Market {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs passes over a shrinking work-list of unsold offers and losing
    /// participants. Participants bid in slice order and offers run in slice
    /// order, so callers control tie-breaking by sorting both.
    pub fn run(&self, participants: &[Participant], offers: &[Offer]) -> Outcome {
        let mut open_offers: Vec<&Offer> = offers.iter().collect();
        let mut losers: Vec<&Participant> = participants.iter().collect();
        let mut outcome = Outcome::default();
        let max_passes = participants.len();

        while !open_offers.is_empty() && !losers.is_empty() && outcome.passes.len() < max_passes {
            let pass = outcome.passes.len() + 1;
            let (stats, sales) = self.run_pass(pass, &losers, &open_offers);
            log_pass(&stats, &sales);

            if stats.status == ConvergenceStatus::MaxRoundsReached {
                outcome.status = ConvergenceStatus::MaxRoundsReached;
            }
            outcome.passes.push(stats);
            if sales.is_empty() {
                break;
            }

            let sold: BTreeSet<ResourceId> = sales.iter().map(|s| s.resource).collect();
            let winners: BTreeSet<&AgentId> = sales.iter().map(|s| &s.winner).collect();
            open_offers.retain(|o| !sold.contains(&o.id));
            losers.retain(|p| !winners.contains(&p.id));
            outcome.sales.extend(sales);
        }

        outcome.unallocated = losers.into_iter().map(|p| p.id.clone()).collect();
        market_info!(
            "Market finished after {} passes: {} sold, {} unallocated",
            outcome.passes.len(),
            outcome.sales.len(),
            outcome.unallocated.len()
        );
        outcome
    }

    fn run_pass(
        &self,
        pass: usize,
        participants: &[&Participant],
        offers: &[&Offer],
    ) -> (PassStats, Vec<Sale>) {
        let mut bidders: Vec<Bidder> = participants
            .iter()
            .map(|p| {
                Bidder::new(
                    p.id.clone(),
                    p.reservation,
                    p.weight,
                    self.config.cost_model,
                    p.distances.clone(),
                )
            })
            .collect();

        let mut auctioneers: Vec<Auctioneer> = offers
            .iter()
            .map(|o| {
                Auctioneer::new(
                    o.id,
                    o.key.clone(),
                    o.starting_price,
                    self.config.bid_increment,
                    self.config.max_silent_rounds,
                )
            })
            .collect();

        for auctioneer in &mut auctioneers {
            for (index, bidder) in bidders.iter_mut().enumerate() {
                auctioneer.add_bidder(index, bidder);
            }
        }
        for bidder in &mut bidders {
            bidder.finish_registration();
        }

        let round_bound = self.round_bound(participants, offers);
        let mut status = ConvergenceStatus::Converged;
        let mut rounds = 0;
        while auctioneers.iter().any(Auctioneer::is_running)
            && bidders.iter().any(Bidder::is_active)
        {
            if rounds >= round_bound {
                status = ConvergenceStatus::MaxRoundsReached;
                warn!(
                    target: "market",
                    "Pass {} did not converge within {} rounds, closing running auctions",
                    pass, round_bound
                );
                break;
            }
            rounds += 1;
            for auctioneer in auctioneers.iter_mut().filter(|a| a.is_running()) {
                auctioneer.run_round(&mut bidders);
            }
        }

        let sales: Vec<Sale> = auctioneers
            .iter_mut()
            .filter_map(|auctioneer| {
                let (winner, price) = auctioneer.finalize(&mut bidders)?;
                Some(Sale {
                    resource: auctioneer.id,
                    key: auctioneer.key.clone(),
                    winner: bidders[winner].id.clone(),
                    price,
                })
            })
            .collect();

        let stats = PassStats {
            pass,
            bidders: participants.len(),
            resources: offers.len(),
            rounds,
            round_bound,
            sales: sales.len(),
            status,
        };
        (stats, sales)
    }

    /// Upper bound on rounds for one pass.
    ///
    /// Every auction accepts at most `price_steps` bids before its price leaves
    /// every reservation value, and at most `max_silent_rounds` silent rounds
    /// can separate two bids anywhere in the market.
    pub fn round_bound(&self, participants: &[&Participant], offers: &[&Offer]) -> u64 {
        let max_reservation = participants
            .iter()
            .map(|p| p.reservation)
            .fold(Price::NEG_INFINITY, Price::max);
        let min_start = offers
            .iter()
            .map(|o| o.starting_price)
            .fold(Price::INFINITY, Price::min);

        let affordable = max_reservation.is_finite() && within_budget(min_start, max_reservation);
        let price_steps = if affordable {
            let span = ((max_reservation - min_start) / self.config.bid_increment).ceil();
            span.max(0.0) as u64 + 1
        } else {
            0
        };
        let pairs = (participants.len() as u64).saturating_mul(offers.len() as u64);
        let derived = pairs
            .saturating_mul(price_steps + 1)
            .saturating_add(1)
            .saturating_mul(self.config.max_silent_rounds as u64);

        match self.config.max_rounds {
            Some(cap) => derived.min(cap),
            None => derived,
        }
    }
}
