use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fleet_sim::publisher::{self, Publisher};
use fleet_sim::simulation::{Fleet, FleetConfig, PoiRegistry, SinkKind};

#[derive(Parser)]
#[command(name = "fleet_sim")]
#[command(about = "Ride-hailing fleet simulator streaming vehicle telemetry")]
struct Cli {
    /// JSON configuration file; the flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kafka bootstrap servers (comma separated)
    #[arg(long)]
    broker: Option<String>,

    /// Topic receiving the status events
    #[arg(long)]
    topic: Option<String>,

    /// Vehicles of a region as NAME=COUNT; repeat for several regions
    #[arg(long = "region", value_parser = parse_region)]
    regions: Vec<(String, i64)>,

    /// Simulated duration in seconds
    #[arg(long, allow_negative_numbers = true)]
    duration: Option<i64>,

    /// Length of one tick in seconds
    #[arg(long, allow_negative_numbers = true)]
    tick: Option<f64>,

    /// Folder holding the pois_<region>.json files
    #[arg(long)]
    poi_dir: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Where to deliver the events
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// Run ticks back to back instead of pacing them to wall-clock time
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    config.validate().context("invalid configuration")?;

    let registries = PoiRegistry::load_dir(&config.poi_dir).with_context(|| {
        format!(
            "failed to load points of interest from {}",
            config.poi_dir.display()
        )
    })?;
    let mut fleet = Fleet::new(config.clone(), registries).context("failed to build the fleet")?;

    let sink = publisher::open_sink(&config).context("failed to open the event sink")?;
    let publisher = Publisher::start(sink, config.topic_name.clone(), config.publish.clone())
        .context("failed to start the publisher")?;

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let mut simulation = tokio::task::spawn_blocking(move || {
        let stats = fleet.run(&publisher, &worker_stop);
        let report = publisher.shutdown();
        (stats, report)
    });

    let (stats, report) = tokio::select! {
        finished = &mut simulation => finished?,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    warn!("Interrupt received, finishing the current tick");
                    stop.store(true, Ordering::SeqCst);
                }
                Err(err) => warn!("Cannot listen for interrupts: {}", err),
            }
            simulation.await?
        }
    };

    stats.log_summary();
    info!(
        "Events delivered: {}, dropped: {}",
        report.delivered, report.dropped
    );
    Ok(())
}

fn build_config(cli: &Cli) -> Result<FleetConfig> {
    let mut config = match &cli.config {
        Some(path) => FleetConfig::load(path)?,
        None => FleetConfig::default(),
    };

    if let Some(broker) = &cli.broker {
        config.broker_address = broker.clone();
    }
    if let Some(topic) = &cli.topic {
        config.topic_name = topic.clone();
    }
    if !cli.regions.is_empty() {
        config.vehicles_per_region = cli.regions.iter().cloned().collect();
    }
    if let Some(duration) = cli.duration {
        config.duration_seconds = duration;
    }
    if let Some(tick) = cli.tick {
        config.tick_seconds = tick;
    }
    if let Some(poi_dir) = &cli.poi_dir {
        config.poi_dir = poi_dir.clone();
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(sink) = cli.sink {
        config.sink = sink;
    }
    if cli.fast {
        config.realtime = false;
    }
    Ok(config)
}

fn parse_region(value: &str) -> Result<(String, i64), String> {
    let (name, count) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=COUNT, got '{}'", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("region name must not be empty".to_string());
    }
    let count = count
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("invalid vehicle count '{}': {}", count, err))?;
    Ok((name.to_string(), count))
}
