pub mod auctioneer;
pub mod bidder;
pub mod cost;
pub mod logging;
pub mod orchestrator;
pub mod types;

pub use auctioneer::Auctioneer;
pub use bidder::Bidder;
pub use cost::CostModel;
pub use orchestrator::{Config, Market, Offer, Outcome, Participant};
pub use types::*;
