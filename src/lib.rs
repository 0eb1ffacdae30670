//! # parkbid - ascending-price parking allocation
//!
//! parkbid allocates scarce parking units among competing vehicles with a
//! repeated ascending-price auction. Every free unit is sold by its own
//! auctioneer; vehicles bid on the unit that minimizes a weighted mix of
//! normalized price and detour distance, up to their reservation value.
//! Units and vehicles left over after a pass are re-auctioned until nothing
//! more can be matched.
//!
//! ## Modules
//!
//! - [`market`] - Bidders, auctioneers and the round loop
//! - [`parking`] - Allocation cycles over parking snapshots, caller-owned context, reports
//! - [`error`] - Error types and handling
//! - [`config`] - JSON configuration loading
//! - [`logger`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use parkbid::*;
//!
//! let input = CycleInput::default()
//!     .with_parking("P1", 1, 10.0)
//!     .with_distance("P1", "P1", 0.0)
//!     .with_agent("veh_a", "P1")
//!     .with_agent("veh_b", "P1")
//!     .with_reservation("veh_a", 15.0)
//!     .with_reservation("veh_b", 12.0);
//! let config = CycleConfig::default()
//!     .with_market(MarketConfig::default().with_bid_increment(1.0).with_max_silent_rounds(3));
//!
//! let result = allocate(&input, &config).unwrap();
//! let award = result.award(&AgentId::from("veh_a")).unwrap();
//! assert_eq!(award.price, 12.0);
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod market;
pub mod parking;

pub use error::*;
pub use market::types::*;
pub use market::{Config as MarketConfig, CostModel, Market};
pub use parking::*;
