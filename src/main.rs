//! auction-snapshot: capture the auction houses of every realm and publish
//! the snapshot as a Parquet file in object storage.

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use auction_snapshot::config::{Config, MetricsConfig};
use auction_snapshot::error::{
    AddressParseSnafu, ConfigSnafu, InspectSnafu, MetricsSnafu, PipelineError,
};
use auction_snapshot::metrics::MetricsExporter;
use auction_snapshot::{run_pipeline, sink};

/// Records printed by `inspect`.
const INSPECT_PREVIEW: usize = 10;

/// Auction-house snapshot exporter.
#[derive(Parser, Debug)]
#[command(name = "auction-snapshot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Without it, credentials are read from
    /// DB_CONNECTION_STRING, BLIZZARD_CLIENT_ID and BLIZZARD_CLIENT_SECRET.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect, write and publish one snapshot (the default).
    Run,
    /// Print the record count and the first records of a snapshot file.
    Inspect {
        /// Snapshot file to read.
        file: PathBuf,
    },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(Command::Inspect { file }) = &args.command {
        return inspect(file);
    }

    info!("auction-snapshot starting");

    let config = build_config(&args)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("API: {} ({})", config.blizzard.api_url(), config.blizzard.namespace());
        info!("Sink: {}", config.sink.path.display());
        match &config.publish.local_root {
            Some(root) => info!(
                "Destination: {}/{}",
                root.join(auction_snapshot::DESTINATION_BUCKET).display(),
                auction_snapshot::publish::PARTITION_TEMPLATE
            ),
            None => info!(
                "Destination: s3://{}/{}",
                auction_snapshot::DESTINATION_BUCKET,
                auction_snapshot::publish::PARTITION_TEMPLATE
            ),
        }
        info!("Configuration is valid");
        return Ok(());
    }

    let metrics_config = config.metrics.clone();
    let exporter = start_metrics(&metrics_config)?;

    let result = run_pipeline(config).await;

    // Export the outcome of failed runs too.
    if let (Some(exporter), Some(path)) = (&exporter, &metrics_config.textfile) {
        if let Err(e) = exporter.write_textfile(path).await {
            warn!("Failed to export metrics: {}", snafu::Report::from_error(e));
        }
    }

    let stats = result?;

    info!("Pipeline completed successfully");
    info!("  Realms: {}", stats.realms);
    info!("  Auction houses: {}", stats.auction_houses);
    info!("  Records written: {}", stats.collected.records);
    info!("  Zero quantity listings: {}", stats.collected.zero_quantity);
    info!("  Bytes uploaded: {}", stats.bytes);
    info!("  Location: {}", stats.upload.location);

    Ok(())
}

fn start_metrics(config: &MetricsConfig) -> Result<Option<MetricsExporter>, PipelineError> {
    if !config.enabled {
        return Ok(None);
    }

    let exporter = MetricsExporter::install().context(MetricsSnafu)?;
    if let Some(address) = &config.address {
        let addr = address.parse().context(AddressParseSnafu)?;
        exporter.serve(addr);
        debug!("Metrics endpoint listening on http://{}/metrics", address);
    }
    Ok(Some(exporter))
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    match &args.config {
        Some(path) => Config::from_file(path).context(ConfigSnafu),
        None => Config::from_env().context(ConfigSnafu),
    }
}

fn inspect(file: &Path) -> Result<(), PipelineError> {
    let records = sink::read_snapshot(file).context(InspectSnafu)?;

    println!("{}: {} records", file.display(), records.len());
    for record in records.iter().take(INSPECT_PREVIEW) {
        println!(
            "{}",
            serde_json::to_string(record).unwrap_or_else(|_| format!("{record:?}"))
        );
    }
    Ok(())
}
