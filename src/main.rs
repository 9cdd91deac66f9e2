//! Tip-Harvest main entry point
//!
//! This is the command-line interface for the Tip-Harvest ingestion pipeline.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tip_harvest::config::{load_config_with_hash, Config};
use tip_harvest::harvest::{harvest, shutdown};
use tip_harvest::output::{load_statistics, print_statistics};
use tip_harvest::storage::{SqliteStorage, TipFilter};
use tip_harvest::{HarvestError, Timespan};
use tracing_subscriber::EnvFilter;

/// Tip-Harvest: a deduplicating tip ingestion pipeline
///
/// Tip-Harvest pages through the public tip listing, resolves every tip to
/// its confirmation comment, amount and timestamp, and stores each tip
/// exactly once. Re-running only adds tips that are not stored yet.
#[derive(Parser, Debug)]
#[command(name = "tip-harvest")]
#[command(version)]
#[command(about = "A deduplicating tip ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults if omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// First listing page to request
    #[arg(long, value_name = "PAGE")]
    start_page: Option<u32>,

    /// Granularity of the run: hour, day or week
    #[arg(long, value_name = "SPAN")]
    timespan: Option<Timespan>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Restrict --stats to one subreddit
    #[arg(long, requires = "stats")]
    subreddit: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), "default".to_string())
        }
    };

    if let Some(start_page) = cli.start_page {
        anyhow::ensure!(start_page >= 1, "--start-page must be at least 1");
        config.harvest.start_page = start_page;
    }
    if let Some(timespan) = cli.timespan {
        config.harvest.timespan = timespan;
    }

    if cli.stats {
        handle_stats(&config, cli.subreddit)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_harvest(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tip_harvest=info,warn"),
            1 => EnvFilter::new("tip_harvest=debug,info"),
            2 => EnvFilter::new("tip_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows aggregates from the database
fn handle_stats(config: &Config, subreddit: Option<String>) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open tip database")?;

    let filter = TipFilter {
        subreddit,
        ..TipFilter::default()
    };
    let now = chrono::Utc::now().timestamp();
    let stats = load_statistics(&storage, &filter, config.harvest.timespan, now)?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
///
/// An interrupted harvest exits with status 130; pages stored before the
/// interrupt are kept.
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Harvesting from page {} with {} workers, database {}",
        config.harvest.start_page,
        config.harvest.workers,
        config.output.database_path
    );

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            trigger.trigger();
        }
    });

    let start_page = config.harvest.start_page;
    match harvest(config, &config_hash, signal).await {
        Ok(summary) => {
            tracing::info!(
                "Harvest completed: {} new tips from {} pages",
                summary.inserted,
                summary.pages
            );
            if summary.listing_unavailable {
                tracing::warn!(
                    "Listing became unavailable at page {}",
                    summary.last_page.unwrap_or(start_page)
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(HarvestError::Interrupted { page }) => {
            tracing::warn!("Harvest interrupted at page {}; stored pages are kept", page);
            Ok(ExitCode::from(130))
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
