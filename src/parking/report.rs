use super::types::{AllocationResult, CycleInput};
use crate::market::types::{ConvergenceStatus, PassStats, Price};
use crate::market_info;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Auction prices against what the same number of vehicles would have paid
/// for the cheapest units at list price (a worst case for the auction).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub original_total: Price,
    pub auction_total: Price,
    /// `(auction − original) / original`, absent when nothing was sold at a non-zero list price
    pub relative_difference: Option<f64>,
}

impl PriceSummary {
    pub fn compute(input: &CycleInput, result: &AllocationResult) -> Self {
        let mut unit_prices: Vec<Price> = input
            .capacities
            .iter()
            .filter_map(|(key, &units)| Some((*input.starting_prices.get(key)?, units)))
            .flat_map(|(price, units)| std::iter::repeat_n(price, units as usize))
            .collect();
        unit_prices.sort_by(f64::total_cmp);

        let original_total: Price = unit_prices.iter().take(result.awards.len()).sum();
        let auction_total: Price = result.awards.values().map(|a| a.price).sum();
        let relative_difference =
            (original_total > 0.0).then(|| (auction_total - original_total) / original_total);

        Self { original_total, auction_total, relative_difference }
    }
}

#[derive(Debug, Serialize)]
pub struct AwardRecord {
    pub agent: String,
    pub key: String,
    pub resource: u32,
    pub price: Price,
}

#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub agent_count: usize,
    pub unit_count: usize,
    pub passes: Vec<PassStats>,
    pub total_rounds: u64,
    pub status: ConvergenceStatus,
    pub awards: Vec<AwardRecord>,
    pub unallocated: Vec<String>,
    pub prices: PriceSummary,
    pub total_duration_ms: f64,
}

pub fn build_report(
    input: &CycleInput,
    result: &AllocationResult,
    started: Instant,
) -> CycleReport {
    let awards = result
        .awards
        .iter()
        .map(|(agent, award)| AwardRecord {
            agent: agent.0.clone(),
            key: award.key.0.clone(),
            resource: award.resource.0,
            price: award.price,
        })
        .collect();

    CycleReport {
        agent_count: input.agents.len(),
        unit_count: input.capacities.values().map(|&u| u as usize).sum(),
        passes: result.passes.clone(),
        total_rounds: result.rounds(),
        status: result.status,
        awards,
        unallocated: result.unallocated.iter().map(|a| a.0.clone()).collect(),
        prices: PriceSummary::compute(input, result),
        total_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}

/// Log the final vehicle → parking table
pub fn log_assignment_table(result: &AllocationResult) {
    market_info!("\nFinal Parking Assignment Table:");
    for (agent, award) in &result.awards {
        market_info!("{}: {} ({}) at {:.2}", agent, award.key, award.resource, award.price);
    }
    for agent in &result.unallocated {
        market_info!("{}: None", agent);
    }
}

pub fn write_report_json<P: AsRef<Path>>(
    report: &CycleReport,
    result_dir: P,
) -> std::io::Result<PathBuf> {
    let summary_path = result_dir.as_ref().join("summary.json");
    let mut summary_file = File::create(&summary_path)?;
    serde_json::to_writer_pretty(&mut summary_file, report)?;
    Ok(summary_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::{AgentId, ResourceId, ResourceKey};
    use crate::parking::types::Award;

    #[test]
    fn test_price_summary_uses_cheapest_units() {
        let input = CycleInput::default()
            .with_parking("cheap", 2, 5.0)
            .with_parking("dear", 1, 20.0);
        let mut result = AllocationResult::default();
        for (agent, price) in [("v1", 7.0), ("v2", 20.0)] {
            result.awards.insert(
                AgentId::from(agent),
                Award { key: ResourceKey::from("cheap"), resource: ResourceId(0), price },
            );
        }

        let summary = PriceSummary::compute(&input, &result);
        assert_eq!(summary.original_total, 10.0);
        assert_eq!(summary.auction_total, 27.0);
        assert_eq!(summary.relative_difference, Some(1.7));
    }

    #[test]
    fn test_price_summary_without_sales() {
        let input = CycleInput::default().with_parking("P", 1, 5.0);
        let summary = PriceSummary::compute(&input, &AllocationResult::default());
        assert_eq!(summary.original_total, 0.0);
        assert_eq!(summary.relative_difference, None);
    }
}
