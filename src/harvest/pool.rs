//! Per-page worker pool
//!
//! Each listing row runs the full resolution chain (comment, detail,
//! timestamp) inside one worker. A page gets a fixed number of workers that
//! pull rows from a shared queue; the page is complete only after every
//! worker has been joined.

use crate::config::Config;
use crate::harvest::detail::DetailClient;
use crate::harvest::listing::ListingRow;
use crate::harvest::resolver::CommentResolver;
use crate::harvest::shutdown::Shutdown;
use crate::harvest::timestamp::TimestampClient;
use crate::state::{DropReason, RowState, TipRecord};
use crate::url::PermalinkLayout;
use crate::HarvestError;
use reqwest::Client;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// The resolution chain for a single row
#[derive(Debug)]
pub struct RowPipeline {
    resolver: CommentResolver,
    details: DetailClient,
    timestamps: TimestampClient,
}

impl RowPipeline {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            resolver: CommentResolver::new(
                client.clone(),
                PermalinkLayout::from(&config.permalink),
                &config.harvest,
            ),
            details: DetailClient::new(client.clone(), &config.endpoints),
            timestamps: TimestampClient::new(client, &config.endpoints),
        }
    }

    /// Runs the chain for `row` and returns its terminal state
    pub async fn resolve_row(&self, row: &ListingRow) -> RowState {
        self.assemble(row).await.into()
    }

    async fn assemble(&self, row: &ListingRow) -> Result<TipRecord, DropReason> {
        let id = self.resolver.resolve(row).await?;
        let detail = self.details.fetch(&id).await?;
        let created_utc = self.timestamps.fetch(&id).await?;

        let record = TipRecord {
            id,
            amount_native: detail.amount_native,
            amount_reference: detail.amount_reference,
            created_utc,
            sender: detail.sender,
            receiver: detail.receiver,
            subreddit: row.subreddit.clone(),
        };
        record.validate()?;
        Ok(record)
    }
}

/// Outcome of resolving every row of one page
#[derive(Debug, Default)]
pub struct PageHarvest {
    pub records: Vec<TipRecord>,
    pub dropped: usize,
    /// Dropped rows per [`DropReason::label`]
    pub drops_by_reason: BTreeMap<&'static str, usize>,
    /// Dropped rows whose chain hit a failed network hop
    pub transport_failures: usize,
    /// Rows whose worker ended without reporting a state
    pub lost: usize,
}

type RowQueue = Arc<Mutex<VecDeque<(usize, ListingRow)>>>;

/// Resolves pages of listing rows with a bounded worker pool
#[derive(Debug, Clone)]
pub struct Harvester {
    pipeline: Arc<RowPipeline>,
    workers: usize,
}

impl Harvester {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            pipeline: Arc::new(RowPipeline::new(config, client)),
            workers: config.harvest.workers.max(1),
        }
    }

    /// Resolves all rows of `page`
    ///
    /// Returns only after every worker has finished. If `shutdown` fires
    /// first, in-flight workers are aborted and nothing from this page is
    /// returned.
    pub async fn harvest_page(
        &self,
        page: u32,
        rows: Vec<ListingRow>,
        shutdown: &mut Shutdown,
    ) -> Result<PageHarvest, HarvestError> {
        let total = rows.len();
        let worker_count = self.workers.min(total);
        let queue: RowQueue = Arc::new(Mutex::new(rows.into_iter().enumerate().collect()));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, RowState)>();

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let pipeline = Arc::clone(&self.pipeline);
            let tx = tx.clone();
            workers.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, row)) = next else {
                        break;
                    };

                    let state = pipeline.resolve_row(&row).await;
                    if let RowState::Dropped(reason) = &state {
                        tracing::debug!(
                            page,
                            permalink = %row.permalink,
                            reason = %reason,
                            "Dropped row"
                        );
                    }
                    if tx.send((index, state)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut states = vec![RowState::Pending; total];
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::warn!("Interrupt received, abandoning page {}", page);
                    workers.abort_all();
                    while workers.join_next().await.is_some() {}
                    return Err(HarvestError::Interrupted { page });
                }
                received = rx.recv() => match received {
                    Some((index, state)) => states[index] = state,
                    None => break,
                },
            }
        }

        // Join barrier: every sender is gone, now make sure every task ended
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker for page {} failed: {}", page, e);
            }
        }

        let mut harvest = PageHarvest::default();
        for state in states {
            match state {
                RowState::Resolved(record) => harvest.records.push(record),
                RowState::Dropped(reason) => {
                    harvest.dropped += 1;
                    if reason.is_transport() {
                        harvest.transport_failures += 1;
                    }
                    *harvest.drops_by_reason.entry(reason.label()).or_default() += 1;
                }
                RowState::Pending => harvest.lost += 1,
            }
        }
        if harvest.lost > 0 {
            tracing::warn!("{} rows on page {} were never resolved", harvest.lost, page);
        }

        Ok(harvest)
    }
}
