//! Preference scoring for bidders

use serde::{Deserialize, Serialize};

/// Closed set of preference functions. Lower scores are preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// Cheapest visible resource wins, distance is ignored
    PriceOnly,
    /// Closest visible resource wins, price is ignored
    DistanceOnly,
    /// `β·price + (1−β)·distance` on normalized terms, with the bidder's own β
    #[default]
    Weighted,
}

/// Normalization ceilings over the resources a bidder can currently see
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ceilings {
    pub price: f64,
    pub distance: f64,
}

impl Ceilings {
    /// Maxima over `(price, distance)` quotes. Callers pass finite prices only.
    pub fn observe(quotes: impl IntoIterator<Item = (f64, f64)>) -> Self {
        quotes
            .into_iter()
            .fold(Self::default(), |acc, (price, distance)| Self {
                price: acc.price.max(price),
                distance: acc.distance.max(distance),
            })
    }
}

impl CostModel {
    pub fn effective_weight(&self, beta: f64) -> f64 {
        match self {
            Self::PriceOnly => 1.0,
            Self::DistanceOnly => 0.0,
            Self::Weighted => beta,
        }
    }

    pub fn score(&self, beta: f64, price: f64, distance: f64, ceilings: Ceilings) -> f64 {
        let beta = self.effective_weight(beta);
        beta * normalized(price, ceilings.price)
            + (1.0 - beta) * normalized(distance, ceilings.distance)
    }
}

// A zero ceiling means every candidate shares the value, so the term cannot discriminate.
fn normalized(value: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 { value / ceiling } else { 0.0 }
}
