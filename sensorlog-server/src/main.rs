//! HTTP ingestion and query server for sensorlog.
//!
//! Accepts JSON readings on `POST /data`, keeps each sensor's recent window
//! in memory, and appends every reading to the day-partitioned logs under
//! the data directory. See the `api` module for the full route list.

mod api;

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sensorlog::{IngestMode, SensorStore, StoreConfig};
use tracing_subscriber::EnvFilter;

/// sensorlog-server — Sensor reading ingestion and query API.
#[derive(Parser)]
#[command(name = "sensorlog-server", version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "SENSORLOG_LISTEN", default_value = "0.0.0.0:5000")]
    listen: String,

    /// Directory holding the partition files. Overrides the config file.
    #[arg(long, env = "SENSORLOG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON store configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capacity of each sensor's recent window. Overrides the config file.
    #[arg(long)]
    max_points: Option<usize>,

    /// Roll back the recent window when a partition append fails.
    #[arg(long)]
    transactional: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        tracing::error!("server failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = store_config(cli)?;
    let store = Arc::new(SensorStore::open(config)?);

    let listener = TcpListener::bind(&cli.listen)?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    api::run_api_server(listener, store);
    Ok(())
}

/// Builds the store configuration: the config file (or defaults), then
/// command-line overrides.
fn store_config(cli: &Cli) -> sensorlog::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    if let Some(max_points) = cli.max_points {
        config.max_points = max_points;
    }
    if cli.transactional {
        config.ingest_mode = IngestMode::Transactional;
    }

    config.validate()?;
    Ok(config)
}
