use anyhow::{Result, bail};
use std::path::Path;
use tracing::info;

mod config;
mod monitor;
mod sim;

use config::{HostConfig, Scenario};

const USAGE: &str = "usage: lsmcu-host simulate [scenario.toml] | lsmcu-host monitor";

fn init_tracing() {
    // Default INFO; allow override via RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // The drives log through the `log` facade
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["simulate"] => simulate(Scenario::default()),
        ["simulate", path] => simulate(Scenario::from_path(Path::new(path))?),
        ["monitor"] => {
            let cfg = HostConfig::load_default().unwrap_or_default();
            monitor::run(cfg).await
        }
        _ => bail!(USAGE),
    }
}

fn simulate(scenario: Scenario) -> Result<()> {
    let report = sim::run(&scenario);
    info!(
        ticks = report.ticks,
        sector_changes = report.sector_changes,
        tachometer = report.tachometer.sector(),
        stepper_power = report.stepper_power,
        "Simulation done"
    );
    for g in &report.gauges {
        info!(
            enabled = g.enabled,
            step = g.step,
            target = g.target_step,
            decibars = g.decibars,
            arrivals = g.arrivals,
            "{:?}",
            g.gauge
        );
    }
    Ok(())
}
