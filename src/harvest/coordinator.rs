//! Harvest coordinator - pagination and persistence
//!
//! Walks the listing one page at a time:
//! - fetch and parse the listing page
//! - resolve its rows through the worker pool
//! - flush the page's records to the store in one transaction
//!
//! The walk ends at the first page without rows, at an unavailable listing
//! page, at the configured page cap, or when shutdown is requested.

use crate::config::{Config, Timespan};
use crate::harvest::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::harvest::listing::{parse_listing, ListingRow};
use crate::harvest::pool::Harvester;
use crate::harvest::shutdown::Shutdown;
use crate::storage::{open_storage, RunStatus, SqliteStorage, TipStore};
use crate::HarvestError;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

/// Where a run starts and how far it may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub start_page: u32,
    pub timespan: Timespan,
    pub max_pages: Option<u32>,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_page: config.harvest.start_page,
            timespan: config.harvest.timespan,
            max_pages: config.harvest.max_pages,
        }
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    /// Listing pages whose rows were processed
    pub pages: u32,
    pub rows: u64,
    pub resolved: u64,
    pub dropped: u64,
    pub inserted: u64,
    pub duplicates: u64,
    /// The walk stopped because a listing page could not be fetched
    pub listing_unavailable: bool,
    /// Last listing page requested
    pub last_page: Option<u32>,
}

enum PageOutcome {
    Processed,
    Exhausted,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Config,
    storage: SqliteStorage,
    client: Client,
    harvester: Harvester,
    config_hash: String,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database file
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, HarvestError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::with_storage(config, config_hash, storage)
    }

    /// Creates a coordinator around an already opened store
    pub fn with_storage(
        config: Config,
        config_hash: impl Into<String>,
        storage: SqliteStorage,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;
        let harvester = Harvester::new(&config, client.clone());

        Ok(Self {
            config,
            storage,
            client,
            harvester,
            config_hash: config_hash.into(),
        })
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs one harvest from `options.start_page` onward
    ///
    /// The run is recorded in the store. An interrupt finishes it as
    /// `interrupted` and is returned as [`HarvestError::Interrupted`]; pages
    /// flushed before the interrupt stay stored.
    pub async fn run(
        &mut self,
        options: RunOptions,
        mut shutdown: Shutdown,
    ) -> Result<RunSummary, HarvestError> {
        let run_id =
            self.storage
                .create_run(&self.config_hash, options.start_page, options.timespan)?;
        tracing::info!(
            "Starting harvest run {} at page {} ({} window)",
            run_id,
            options.start_page,
            options.timespan.listing_window()
        );

        let mut summary = RunSummary {
            run_id,
            ..RunSummary::default()
        };
        let result = self.paginate(options, &mut shutdown, &mut summary).await;

        let status = match &result {
            Ok(()) => RunStatus::Completed,
            Err(HarvestError::Interrupted { .. }) => RunStatus::Interrupted,
            Err(_) => RunStatus::Failed,
        };
        if let Err(e) =
            self.storage
                .finish_run(run_id, status, summary.pages, summary.inserted)
        {
            tracing::error!("Failed to record end of run {}: {}", run_id, e);
        }

        match result {
            Ok(()) => {
                tracing::info!(
                    "Harvest run {} completed: {} pages, {} rows, {} new tips, {} duplicates, {} dropped",
                    run_id,
                    summary.pages,
                    summary.rows,
                    summary.inserted,
                    summary.duplicates,
                    summary.dropped
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(
                    "Harvest run {} stopped after {} pages: {}",
                    run_id,
                    summary.pages,
                    e
                );
                Err(e)
            }
        }
    }

    async fn paginate(
        &mut self,
        options: RunOptions,
        shutdown: &mut Shutdown,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        let mut page = options.start_page;

        loop {
            if let Some(max) = options.max_pages {
                if summary.pages >= max {
                    tracing::info!("Reached page limit of {}", max);
                    return Ok(());
                }
            }
            if shutdown.is_triggered() {
                return Err(HarvestError::Interrupted { page });
            }

            summary.last_page = Some(page);
            match self.process_page(page, &options, shutdown, summary).await? {
                PageOutcome::Processed => page += 1,
                PageOutcome::Exhausted => return Ok(()),
            }
        }
    }

    async fn process_page(
        &mut self,
        page: u32,
        options: &RunOptions,
        shutdown: &mut Shutdown,
        summary: &mut RunSummary,
    ) -> Result<PageOutcome, HarvestError> {
        let listing_url = self.config.endpoints.listing_url(page, options.timespan);
        let base_url = Url::parse(&listing_url)?;
        tracing::debug!("Fetching listing page {}: {}", page, listing_url);

        let fetched = tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(HarvestError::Interrupted { page }),
            fetched = fetch_url(&self.client, &listing_url) => fetched,
        };

        let body = match fetched {
            FetchResult::Success { status_code, body } => {
                tracing::debug!("Listing page {} answered HTTP {}", page, status_code);
                body
            }
            FetchResult::Unavailable { reason } => {
                tracing::warn!(
                    "Listing page {} unavailable ({}), stopping pagination",
                    page,
                    reason
                );
                summary.listing_unavailable = true;
                return Ok(PageOutcome::Exhausted);
            }
        };

        let rows = parse_listing(&body, &base_url);
        if rows.is_empty() {
            tracing::info!("Listing page {} has no rows, harvest complete", page);
            return Ok(PageOutcome::Exhausted);
        }
        log_age_buckets(page, &rows, options.timespan);

        let row_count = rows.len();
        let harvest = self.harvester.harvest_page(page, rows, shutdown).await?;
        let outcome = self
            .storage
            .insert_batch(&harvest.records, Some(summary.run_id))?;

        summary.pages += 1;
        summary.rows += row_count as u64;
        summary.resolved += harvest.records.len() as u64;
        summary.dropped += harvest.dropped as u64;
        summary.inserted += outcome.inserted;
        summary.duplicates += outcome.duplicates;

        tracing::info!(
            page,
            rows = row_count,
            resolved = harvest.records.len(),
            dropped = harvest.dropped,
            unavailable = harvest.transport_failures,
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            "Page flushed"
        );
        if !harvest.drops_by_reason.is_empty() {
            tracing::debug!("Drops on page {}: {:?}", page, harvest.drops_by_reason);
        }

        Ok(PageOutcome::Processed)
    }
}

/// Logs how many rows of a page fall into each relative-age bucket
fn log_age_buckets(page: u32, rows: &[ListingRow], timespan: Timespan) {
    let mut buckets: BTreeMap<u32, usize> = BTreeMap::new();
    let mut outside = 0;
    for row in rows {
        match row.age.bucket(timespan) {
            Some(bucket) => *buckets.entry(bucket).or_default() += 1,
            None => outside += 1,
        }
    }
    tracing::debug!(
        "Page {} rows by {} bucket: {:?} ({} older)",
        page,
        timespan,
        buckets,
        outside
    );
}
