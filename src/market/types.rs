//! Core identifiers and state enums shared by bidders, auctioneers and the market

use serde::{Deserialize, Serialize};

/// Monetary amount. Unaffordable prices are represented by `f64::INFINITY`.
pub type Price = f64;

/// Opaque vehicle identifier, unique within one allocation cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// Logical parking location; expands into one auction per free unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(pub String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// Single-unit auction instance. Ordering defines round order and tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidderState {
    Seeking,
    Winning,
    Won,
    /// Every visible resource is priced above the reservation value or closed
    OutOfBudget,
}

impl BidderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::OutOfBudget)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Running,
    Won,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConvergenceStatus {
    #[default]
    Converged,
    /// The round bound was hit and running auctions were closed with their current winner
    MaxRoundsReached,
}

/// A resource that closed with a winner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub resource: ResourceId,
    pub key: ResourceKey,
    pub winner: AgentId,
    pub price: Price,
}

/// Per-pass statistics of the market loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassStats {
    pub pass: usize,
    pub bidders: usize,
    pub resources: usize,
    pub rounds: u64,
    pub round_bound: u64,
    pub sales: usize,
    pub status: ConvergenceStatus,
}
