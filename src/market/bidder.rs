//! Vehicle-side state machine of the ascending auction

use crate::market::cost::{Ceilings, CostModel};
use crate::market::types::{AgentId, BidderState, Price, ResourceId, ResourceKey};
use std::collections::BTreeMap;

const BUDGET_TOLERANCE: f64 = 1e-9;

/// Inclusive budget check, tolerant of rounding in `start + n * step` prices.
pub(crate) fn within_budget(price: Price, reservation: Price) -> bool {
    price - reservation <= BUDGET_TOLERANCE * reservation.abs().max(1.0)
}

/// What a bidder knows about one auction it is registered with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Price,
    pub distance: f64,
}

/// A vehicle competing for a parking unit.
///
/// Bidders only react to calls from auctioneers and the market; they never
/// reach into other bidders or resources. Known prices only ever grow, and
/// become infinite once a resource is above the reservation value or closed.
#[derive(Debug, Clone)]
pub struct Bidder {
    pub id: AgentId,
    pub reservation: Price,
    pub weight: f64,
    cost_model: CostModel,
    distances: BTreeMap<ResourceKey, f64>,
    known: BTreeMap<ResourceId, Quote>,
    state: BidderState,
}

impl Bidder {
    pub fn new(
        id: AgentId,
        reservation: Price,
        weight: f64,
        cost_model: CostModel,
        distances: BTreeMap<ResourceKey, f64>,
    ) -> Self {
        Self {
            id,
            reservation,
            weight,
            cost_model,
            distances,
            known: BTreeMap::new(),
            state: BidderState::Seeking,
        }
    }

    pub fn state(&self) -> BidderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn known_price(&self, resource: ResourceId) -> Option<Price> {
        self.known.get(&resource).map(|q| q.price)
    }

    /// Starts watching an auction. Returns false when the key is not reachable.
    pub fn register(&mut self, resource: ResourceId, key: &ResourceKey, price: Price) -> bool {
        let Some(&distance) = self.distances.get(key) else {
            return false;
        };
        self.known.insert(resource, Quote { price: self.effective(price), distance });
        true
    }

    /// Called once every auction had the chance to register this bidder.
    pub fn finish_registration(&mut self) {
        self.check_budget();
    }

    pub fn inform_price(&mut self, resource: ResourceId, price: Price) {
        let effective = self.effective(price);
        if let Some(quote) = self.known.get_mut(&resource)
            && effective > quote.price
        {
            quote.price = effective;
        }
        self.check_budget();
    }

    /// The auction finished; it can no longer be bid on.
    pub fn inform_closed(&mut self, resource: ResourceId) {
        self.inform_price(resource, Price::INFINITY);
    }

    /// Asks whether the bidder accepts `price` on `resource`.
    pub fn ask_bid(&mut self, resource: ResourceId, price: Price) -> bool {
        if self.state != BidderState::Seeking || !self.known.contains_key(&resource) {
            return false;
        }
        self.inform_price(resource, price);
        if !self.affords(price) {
            return false;
        }

        if self.preferred() == Some(resource) {
            self.state = BidderState::Winning;
            true
        } else {
            false
        }
    }

    pub fn tell_overbid(&mut self) {
        if self.state == BidderState::Winning {
            self.state = BidderState::Seeking;
            self.check_budget();
        }
    }

    pub fn tell_won(&mut self) {
        self.state = BidderState::Won;
    }

    /// Lowest-score resource among the affordable ones; ties go to the lowest id.
    pub fn preferred(&self) -> Option<ResourceId> {
        let visible = || self.known.iter().filter(|(_, q)| q.price.is_finite());
        let ceilings = Ceilings::observe(visible().map(|(_, q)| (q.price, q.distance)));

        let mut best: Option<(ResourceId, f64)> = None;
        for (&id, quote) in visible() {
            let score = self.cost_model.score(self.weight, quote.price, quote.distance, ceilings);
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn affords(&self, price: Price) -> bool {
        within_budget(price, self.reservation)
    }

    fn effective(&self, price: Price) -> Price {
        if self.affords(price) { price } else { Price::INFINITY }
    }

    // Winning bidders keep their state even when their own auction outgrows the budget.
    fn check_budget(&mut self) {
        let priced_out = self.known.values().all(|q| q.price.is_infinite());
        if self.state == BidderState::Seeking && priced_out {
            self.state = BidderState::OutOfBudget;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bidder(reservation: Price, weight: f64, distances: &[(&str, f64)]) -> Bidder {
        Bidder::new(
            AgentId::from("v1"),
            reservation,
            weight,
            CostModel::Weighted,
            distances.iter().map(|(k, d)| (ResourceKey::from(*k), *d)).collect(),
        )
    }

    #[test]
    fn test_register_requires_known_key() {
        let mut b = bidder(100.0, 0.5, &[("A", 10.0)]);
        assert!(b.register(ResourceId(0), &ResourceKey::from("A"), 5.0));
        assert!(!b.register(ResourceId(1), &ResourceKey::from("B"), 5.0));
        assert_eq!(b.known_price(ResourceId(0)), Some(5.0));
        assert_eq!(b.known_price(ResourceId(1)), None);
    }

    #[test]
    fn test_empty_distance_map_is_out_of_budget() {
        let mut b = bidder(100.0, 0.5, &[]);
        b.finish_registration();
        assert_eq!(b.state(), BidderState::OutOfBudget);
    }

    #[test]
    fn test_price_only_prefers_cheapest() {
        let mut b = bidder(30.0, 1.0, &[("A", 500.0), ("B", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 5.0);
        b.register(ResourceId(1), &ResourceKey::from("B"), 20.0);
        b.finish_registration();

        assert!(!b.ask_bid(ResourceId(1), 20.0));
        assert_eq!(b.state(), BidderState::Seeking);
        assert!(b.ask_bid(ResourceId(0), 5.0));
        assert_eq!(b.state(), BidderState::Winning);
    }

    #[test]
    fn test_ties_go_to_lowest_resource_id() {
        let mut b = bidder(30.0, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(3), &ResourceKey::from("A"), 10.0);
        b.register(ResourceId(7), &ResourceKey::from("A"), 10.0);
        b.finish_registration();

        assert_eq!(b.preferred(), Some(ResourceId(3)));
        assert!(!b.ask_bid(ResourceId(7), 10.0));
        assert!(b.ask_bid(ResourceId(3), 10.0));
    }

    #[test]
    fn test_known_prices_never_decrease() {
        let mut b = bidder(30.0, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 12.0);
        b.inform_price(ResourceId(0), 8.0);
        assert_eq!(b.known_price(ResourceId(0)), Some(12.0));
        b.inform_price(ResourceId(0), 14.0);
        assert_eq!(b.known_price(ResourceId(0)), Some(14.0));
    }

    #[test]
    fn test_unaffordable_everywhere_goes_out_of_budget() {
        let mut b = bidder(12.0, 0.5, &[("A", 10.0), ("B", 20.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 10.0);
        b.register(ResourceId(1), &ResourceKey::from("B"), 11.0);
        b.finish_registration();

        b.inform_price(ResourceId(0), 13.0);
        assert_eq!(b.state(), BidderState::Seeking);
        assert_eq!(b.known_price(ResourceId(0)), Some(Price::INFINITY));

        assert!(!b.ask_bid(ResourceId(1), 12.5));
        assert_eq!(b.state(), BidderState::OutOfBudget);
    }

    #[test]
    fn test_reservation_is_inclusive() {
        let mut b = bidder(13.0, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 13.0);
        b.finish_registration();
        assert!(b.ask_bid(ResourceId(0), 13.0));
    }

    #[test]
    fn test_budget_check_absorbs_step_rounding() {
        let b = bidder(0.3, 0.5, &[("A", 10.0)]);
        assert!(b.affords(0.1 + 0.1 + 0.1));
        assert!(b.affords(3.0 * 0.1));
        assert!(!b.affords(0.31));

        let mut b = bidder(0.3, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 0.0);
        b.finish_registration();
        assert!(b.ask_bid(ResourceId(0), 3.0 * 0.1));
    }

    #[test]
    fn test_winning_bidder_survives_price_broadcast() {
        let mut b = bidder(10.0, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 10.0);
        b.finish_registration();
        assert!(b.ask_bid(ResourceId(0), 10.0));

        b.inform_price(ResourceId(0), 11.0);
        assert_eq!(b.state(), BidderState::Winning);

        b.tell_overbid();
        assert_eq!(b.state(), BidderState::OutOfBudget);
    }

    #[test]
    fn test_terminal_states_never_bid() {
        let mut b = bidder(100.0, 0.5, &[("A", 10.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 10.0);
        b.finish_registration();
        b.tell_won();
        assert!(!b.ask_bid(ResourceId(0), 10.0));
        assert_eq!(b.state(), BidderState::Won);
    }

    #[test]
    fn test_closed_resource_is_dropped_from_preferences() {
        let mut b = bidder(100.0, 0.0, &[("A", 10.0), ("B", 50.0)]);
        b.register(ResourceId(0), &ResourceKey::from("A"), 10.0);
        b.register(ResourceId(1), &ResourceKey::from("B"), 10.0);
        b.finish_registration();
        assert_eq!(b.preferred(), Some(ResourceId(0)));

        b.inform_closed(ResourceId(0));
        assert_eq!(b.preferred(), Some(ResourceId(1)));
    }
}
