//! Harvest module - the tip ingestion pipeline
//!
//! This module contains the core pipeline, including:
//! - HTTP fetching that never fails a run
//! - Listing page parsing and relative-age bucketing
//! - Comment resolution over a parsed thread tree
//! - Tip detail and timestamp lookups
//! - The per-page worker pool and the pagination coordinator

mod coordinator;
mod detail;
mod fetcher;
mod listing;
mod pool;
mod resolver;
pub mod shutdown;
mod timestamp;

pub use coordinator::{Coordinator, RunOptions, RunSummary};
pub use detail::{parse_tip_detail, DetailClient, TipDetail};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use listing::{parse_listing, AgeUnit, ListingRow, RelativeAge};
pub use pool::{Harvester, PageHarvest, RowPipeline};
pub use resolver::{
    parse_comment_tree, select_tip_comment, CommentNode, CommentResolver, CommentTree,
};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use timestamp::{parse_created_utc, TimestampClient};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for a harvest. It will:
/// 1. Open the configured store and record a run
/// 2. Walk the listing from the configured start page
/// 3. Resolve every row and flush each page atomically
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `shutdown` - Interrupt signal
pub async fn harvest(
    config: Config,
    config_hash: &str,
    shutdown: Shutdown,
) -> Result<RunSummary, HarvestError> {
    let options = RunOptions::from_config(&config);
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run(options, shutdown).await
}
