use crate::market::types::{PassStats, Sale};

#[macro_export]
macro_rules! market_info {
    ($($arg:tt)+) => {
        tracing::info!(target: "market", $($arg)+)
    }
}

/// Log the outcome of one pass of the market loop
pub fn log_pass(stats: &PassStats, sales: &[Sale]) {
    market_info!(
        "Pass {}: {} bidders, {} resources, {} rounds (bound {}), {} sold, {:?}",
        stats.pass,
        stats.bidders,
        stats.resources,
        stats.rounds,
        stats.round_bound,
        stats.sales,
        stats.status
    );
    for sale in sales {
        market_info!("  {} ({}) -> {} at {:.2}", sale.resource, sale.key, sale.winner, sale.price);
    }
}
