//! Runs one parking allocation cycle from a JSON snapshot and writes a report

use clap::Parser;
use serde::Deserialize;

use parkbid::config::{load_json, save_json};
use parkbid::logger::{self, LogConfig};
use parkbid::{
    available_units, build_report, distort_capacities, log_assignment_table, nearest_free,
    write_report_json, AllocationCycle, CycleConfig, CycleInput,
};
use tracing::info;

use chrono::Local;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OutputConfig {
    dir: String,
    use_timestamp: bool,
    timestamp_fmt: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "results".to_string(),
            use_timestamp: true,
            timestamp_fmt: "%Y-%m-%d_%H-%M-%S".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    cycle: CycleConfig,
    output_config: OutputConfig,
    /// Mean squared error of the occupancy sensor, 0 for exact counts
    occupancy_mse: u32,
    log: LogConfig,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "demos/config.json")]
    config: String,

    /// Path to the cycle snapshot
    #[arg(long, default_value = "demos/scenario.json")]
    scenario: String,

    /// Occupancy sensor error (overrides config)
    #[arg(long)]
    uncertainty: Option<u32>,

    /// Output directory (overrides config)
    #[arg(long)]
    output: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config: DemoConfig = match load_json(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {:#}", cli.config, e);
            return Err(e.into());
        }
    };
    if let Some(mse) = cli.uncertainty {
        config.occupancy_mse = mse;
    }
    if let Some(dir) = cli.output {
        config.output_config.dir = dir;
    }

    let output = &config.output_config;
    let result_dir = if output.use_timestamp {
        let date_str = Local::now().format(&output.timestamp_fmt).to_string();
        Path::new(&output.dir).join(date_str)
    } else {
        Path::new(&output.dir).to_path_buf()
    };
    std::fs::create_dir_all(&result_dir)?;

    let started = Instant::now();
    let _guard = logger::init(&result_dir, &config.log)?;

    info!("Loaded configuration from {}", cli.config);
    info!("Results will be saved to: {}", result_dir.display());

    let mut input: CycleInput = load_json(&cli.scenario)?;
    info!(
        "Snapshot {}: {} vehicles, {} parkings",
        cli.scenario,
        input.agents.len(),
        input.capacities.len()
    );

    if config.occupancy_mse > 0 {
        let mut rng = StdRng::seed_from_u64(config.cycle.seed);
        let sensed = distort_capacities(&input.capacities, config.occupancy_mse, &mut rng);
        info!("Sensed capacities with mse {}: {:?}", config.occupancy_mse, sensed);
        input.capacities = available_units(&sensed);
    }
    save_json(&input, result_dir.join("snapshot.json"))?;

    let baseline = nearest_free(&input.agents, &input.capacities, &input.distances);
    info!(
        "Nearest-free guidance would place {} of {} vehicles",
        baseline.len(),
        input.agents.len()
    );

    let cycle = AllocationCycle::new(&input, &config.cycle)?;
    let result = cycle.run()?;
    log_assignment_table(&result);

    let report = build_report(&input, &result, started);
    let summary_path = write_report_json(&report, &result_dir)?;
    info!("JSON summary saved to {}", summary_path.display());

    Ok(())
}
