//! Error types for allocation cycles

use thiserror::Error;

/// Errors raised while validating or applying an allocation cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Agent {agent} targets unknown resource key {key}")]
    UnknownResourceKey { agent: String, key: String },
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
    #[error("Resource key {0} has no starting price")]
    MissingStartingPrice(String),
    #[error("Resource key {key} has non-positive capacity {capacity}")]
    InvalidCapacity { key: String, capacity: u32 },
    #[error("Invalid bid increment: {0}")]
    InvalidBidIncrement(f64),
    #[error("Invalid price for {key}: {price}")]
    InvalidPrice { key: String, price: f64 },
    #[error("Invalid distance from {from} to {to}: {distance}")]
    InvalidDistance { from: String, to: String, distance: f64 },
    #[error("Invalid reservation value for {agent}: {value}")]
    InvalidReservation { agent: String, value: f64 },
    #[error("Weight {0} is outside [0, 1]")]
    InvalidWeight(f64),
    #[error("Invalid weight distribution: {0}")]
    InvalidDistribution(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Agent {agent} won both {first} and {second}")]
    DuplicateAward { agent: String, first: String, second: String },
    #[error("Stop replacement failed for {agent}: {reason}")]
    StopReplacement { agent: String, reason: String },
}

/// A specialized Result type for allocation operations
pub type Result<T> = std::result::Result<T, Error>;
