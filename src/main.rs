//! Regional Devsim - Entry Point
//!
//! Loads a strategy and a scenario, runs the simulated years, and writes the
//! reports and account ledgers as JSON.

use std::path::PathBuf;

use clap::Parser;
use regional_devsim::core::error::Result;
use regional_devsim::rules::StrategyConfig;
use regional_devsim::simulation::{Scenario, SimulationOptions, SyntheticConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run a policy strategy over a development scenario
#[derive(Parser, Debug)]
#[command(name = "devsim")]
#[command(about = "Simulate development fees, policy modifiers and subsidy allocation")]
struct Args {
    /// Strategy TOML (accounts, fees, modifiers, subsidy programs)
    #[arg(long)]
    strategy: PathBuf,

    /// Scenario JSON; a synthetic scenario is generated when omitted
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Random seed for the synthetic scenario
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Parcels in the synthetic scenario
    #[arg(long, default_value_t = 500)]
    parcels: u32,

    /// Years to simulate (all scenario years when omitted)
    #[arg(long)]
    years: Option<u32>,

    /// Only build subsidized projects
    #[arg(long, default_value_t = false)]
    no_market: bool,

    /// Where to write the JSON output
    #[arg(long, default_value = "devsim_output.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("regional_devsim=info")),
        )
        .init();

    let args = Args::parse();

    let strategy = StrategyConfig::load_from_file(&args.strategy)?.compile()?;

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load_json(path)?,
        None => Scenario::synthetic(&SyntheticConfig {
            seed: args.seed,
            parcels: args.parcels,
            years: args.years.unwrap_or(5),
            ..Default::default()
        }),
    };
    if let Some(years) = args.years {
        scenario.years.truncate(years as usize);
    }

    info!(
        start_year = scenario.start_year,
        years = scenario.years.len(),
        "starting run"
    );

    let options = SimulationOptions {
        place_market_projects: !args.no_market,
    };
    let output = scenario.run(strategy, options)?;

    println!("{}", output.summary());
    for report in &output.reports {
        println!("  {}", report.summary());
    }

    std::fs::write(&args.output, output.to_json())?;
    println!("\nFull output written to {}", args.output.display());
    Ok(())
}
