//! Single-unit ascending-price auction

use crate::market::bidder::Bidder;
use crate::market::types::{AuctionStatus, Price, ResourceId, ResourceKey};
use tracing::debug;

/// One parking unit sold by ascending price.
///
/// Bidders live in an arena owned by the market; the auctioneer refers to them
/// by index and only touches the ones registered with it. After `n` accepted
/// bids the ask price is `starting_price + n * bid_increment`, computed from
/// the count so it never drifts off the price grid. The clearing price is the
/// winner's bid, one step below the ask.
#[derive(Debug, Clone)]
pub struct Auctioneer {
    pub id: ResourceId,
    pub key: ResourceKey,
    starting_price: Price,
    price: Price,
    bid_increment: Price,
    max_silent_rounds: u32,
    bidders: Vec<usize>,
    accepted_bids: u32,
    winner: Option<usize>,
    winning_bid: Price,
    silence_count: u32,
    status: AuctionStatus,
}

impl Auctioneer {
    pub fn new(
        id: ResourceId,
        key: ResourceKey,
        starting_price: Price,
        bid_increment: Price,
        max_silent_rounds: u32,
    ) -> Self {
        Self {
            id,
            key,
            starting_price,
            price: starting_price,
            bid_increment,
            max_silent_rounds,
            bidders: Vec::new(),
            accepted_bids: 0,
            winner: None,
            winning_bid: starting_price,
            silence_count: 0,
            status: AuctionStatus::Running,
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn starting_price(&self) -> Price {
        self.starting_price
    }

    pub fn status(&self) -> AuctionStatus {
        self.status
    }

    pub fn accepted_bids(&self) -> u32 {
        self.accepted_bids
    }

    pub fn is_running(&self) -> bool {
        self.status == AuctionStatus::Running
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn silence_count(&self) -> u32 {
        self.silence_count
    }

    pub fn bidder_count(&self) -> usize {
        self.bidders.len()
    }

    /// Registers `bidder` (arena slot `index`) if it can reach this resource.
    pub fn add_bidder(&mut self, index: usize, bidder: &mut Bidder) -> bool {
        if !bidder.register(self.id, &self.key, self.price) {
            return false;
        }
        self.bidders.push(index);
        true
    }

    /// Offers the current price to every registered bidder except the winner.
    ///
    /// Returns whether any bid was accepted. After `max_silent_rounds` silent
    /// rounds in a row the auction finalizes itself.
    pub fn run_round(&mut self, bidders: &mut [Bidder]) -> bool {
        if !self.is_running() {
            return false;
        }

        let mut bid_received = false;
        for pos in 0..self.bidders.len() {
            let index = self.bidders[pos];
            if self.winner == Some(index) || !bidders[index].ask_bid(self.id, self.price) {
                continue;
            }

            if let Some(previous) = self.winner.replace(index) {
                bidders[previous].tell_overbid();
            }
            debug!(
                target: "market",
                "{} ({}) accepted by {} at {}",
                self.id, self.key, bidders[index].id, self.price
            );
            self.winning_bid = self.price;
            self.accepted_bids += 1;
            self.price = self.starting_price + f64::from(self.accepted_bids) * self.bid_increment;
            for &registered in &self.bidders {
                bidders[registered].inform_price(self.id, self.price);
            }
            bid_received = true;
        }

        if bid_received {
            self.silence_count = 0;
        } else {
            self.silence_count += 1;
            if self.silence_count >= self.max_silent_rounds {
                self.finalize(bidders);
            }
        }
        bid_received
    }

    /// Closes the auction and returns the winner slot with its clearing price.
    ///
    /// Idempotent: a closed auction reports the same outcome again.
    pub fn finalize(&mut self, bidders: &mut [Bidder]) -> Option<(usize, Price)> {
        if self.is_running() {
            self.status = match self.winner {
                Some(winner) => {
                    bidders[winner].tell_won();
                    AuctionStatus::Won
                }
                None => AuctionStatus::Terminated,
            };
            for &registered in &self.bidders {
                bidders[registered].inform_closed(self.id);
            }
            debug!(
                target: "market",
                "{} ({}) closed as {:?} at {}",
                self.id, self.key, self.status, self.price
            );
        }
        self.outcome()
    }

    pub fn outcome(&self) -> Option<(usize, Price)> {
        match (self.status, self.winner) {
            (AuctionStatus::Won, Some(winner)) => Some((winner, self.winning_bid)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::cost::CostModel;
    use crate::market::types::{AgentId, BidderState};

    fn bidders(reservations: &[Price]) -> Vec<Bidder> {
        reservations
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                Bidder::new(
                    AgentId::new(format!("v{i}")),
                    r,
                    0.5,
                    CostModel::Weighted,
                    [(ResourceKey::from("P"), 100.0)].into_iter().collect(),
                )
            })
            .collect()
    }

    fn auction(bidders: &mut [Bidder], start: Price, silent: u32) -> Auctioneer {
        auction_with_step(bidders, start, 1.0, silent)
    }

    fn auction_with_step(
        bidders: &mut [Bidder],
        start: Price,
        step: Price,
        silent: u32,
    ) -> Auctioneer {
        let mut a = Auctioneer::new(ResourceId(0), ResourceKey::from("P"), start, step, silent);
        for (i, b) in bidders.iter_mut().enumerate() {
            a.add_bidder(i, b);
        }
        for b in bidders.iter_mut() {
            b.finish_registration();
        }
        a
    }

    #[test]
    fn test_contested_round_raises_price_twice() {
        let mut bs = bidders(&[15.0, 12.0]);
        let mut a = auction(&mut bs, 10.0, 3);

        assert!(a.run_round(&mut bs));
        assert_eq!(a.price(), 12.0);
        assert_eq!(a.winner(), Some(1));
        assert_eq!(bs[0].state(), BidderState::Seeking);
        assert_eq!(bs[1].state(), BidderState::Winning);
    }

    #[test]
    fn test_price_is_monotone_and_clears_below_ask() {
        let mut bs = bidders(&[15.0, 12.0]);
        let mut a = auction(&mut bs, 10.0, 2);

        let mut last = a.price();
        while a.is_running() {
            a.run_round(&mut bs);
            assert!(a.price() >= last);
            last = a.price();
        }

        assert_eq!(a.status(), AuctionStatus::Won);
        assert_eq!(a.outcome(), Some((0, 12.0)));
        assert_eq!(bs[0].state(), BidderState::Won);
        assert_eq!(bs[1].state(), BidderState::OutOfBudget);
    }

    #[test]
    fn test_silence_without_bids_terminates() {
        let mut bs = bidders(&[5.0, 6.0, 7.0]);
        let mut a = auction(&mut bs, 10.0, 3);
        assert!(bs.iter().all(|b| b.state() == BidderState::OutOfBudget));

        for _ in 0..2 {
            assert!(!a.run_round(&mut bs));
            assert!(a.is_running());
        }
        assert!(!a.run_round(&mut bs));
        assert_eq!(a.status(), AuctionStatus::Terminated);
        assert_eq!(a.finalize(&mut bs), None);
    }

    #[test]
    fn test_bid_resets_silence() {
        let mut bs = bidders(&[20.0]);
        let mut a = auction(&mut bs, 10.0, 5);
        assert!(a.run_round(&mut bs));
        assert_eq!(a.silence_count(), 0);
        assert!(!a.run_round(&mut bs));
        assert_eq!(a.silence_count(), 1);
    }

    #[test]
    fn test_forced_finalize_keeps_current_winner() {
        let mut bs = bidders(&[20.0]);
        let mut a = auction(&mut bs, 10.0, 100);
        a.run_round(&mut bs);
        assert_eq!(a.finalize(&mut bs), Some((0, 10.0)));
        assert_eq!(a.status(), AuctionStatus::Won);
        assert!(!a.run_round(&mut bs));
        assert_eq!(a.finalize(&mut bs), Some((0, 10.0)));
    }

    #[test]
    fn test_unreachable_bidder_is_not_registered() {
        let mut b =
            Bidder::new(AgentId::from("far"), 50.0, 0.5, CostModel::Weighted, Default::default());
        let mut a = Auctioneer::new(ResourceId(0), ResourceKey::from("P"), 10.0, 1.0, 3);
        assert!(!a.add_bidder(0, &mut b));
        assert_eq!(a.bidder_count(), 0);
    }

    #[test]
    fn test_price_stays_on_step_grid() {
        let mut bs = bidders(&[100.0, 100.0]);
        let mut a = auction_with_step(&mut bs, 0.0, 0.1, 3);
        for _ in 0..5 {
            a.run_round(&mut bs);
        }
        assert_eq!(a.accepted_bids(), 10);
        assert_eq!(a.price(), a.starting_price() + 10.0 * 0.1);
        assert_eq!(a.price(), 1.0);
    }

    #[test]
    fn test_reservation_on_fractional_step_still_bids() {
        // 0.1 + 0.1 + 0.1 != 0.3, the third step must still be affordable at 0.3
        let mut bs = bidders(&[0.2, 0.3]);
        let mut a = auction_with_step(&mut bs, 0.0, 0.1, 2);
        while a.is_running() {
            a.run_round(&mut bs);
        }
        let (winner, price) = a.outcome().unwrap();
        assert_eq!(winner, 1);
        assert!((price - 0.3).abs() < 1e-12);
        assert_eq!(bs[0].state(), BidderState::OutOfBudget);
    }
}
