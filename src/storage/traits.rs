//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::config::Timespan;
use crate::state::TipRecord;
use crate::storage::{
    BatchOutcome, InsertOutcome, RunRecord, RunStatus, SubredditTotal, TipFilter, TipSummary,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row in database: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for tip store implementations
///
/// The pipeline only ever calls the insert operations; the read side exists
/// for reporting. Uniqueness of `TipRecord::id` is enforced by the backing
/// engine, never by a pre-check in the caller.
pub trait TipStore {
    // ===== Run Management =====

    /// Creates a new harvest run and returns its ID
    fn create_run(
        &mut self,
        config_hash: &str,
        start_page: u32,
        timespan: Timespan,
    ) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status and counters of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages: u32,
        inserted: u64,
    ) -> StorageResult<()>;

    // ===== Tip Ingestion =====

    /// Inserts a record unless one with the same id already exists
    ///
    /// A duplicate id is not an error: the call returns
    /// [`InsertOutcome::Duplicate`] and leaves the stored record untouched.
    fn insert_if_absent(
        &mut self,
        record: &TipRecord,
        run_id: Option<i64>,
    ) -> StorageResult<InsertOutcome>;

    /// Inserts a page of records atomically with insert-if-absent semantics
    ///
    /// Readers see either none or all of the batch's new records.
    fn insert_batch(
        &mut self,
        records: &[TipRecord],
        run_id: Option<i64>,
    ) -> StorageResult<BatchOutcome>;

    /// Gets a stored record by its fullname
    fn get_tip(&self, id: &str) -> StorageResult<Option<TipRecord>>;

    // ===== Aggregates =====

    /// Counts stored tips matching the filter
    fn count_tips(&self, filter: &TipFilter) -> StorageResult<u64>;

    /// Count, sums and average over stored tips matching the filter
    fn summarize(&self, filter: &TipFilter) -> StorageResult<TipSummary>;

    /// Reference-unit totals per time bucket, most recent bucket first
    ///
    /// Bucket `i` covers `(now - (i + 1) * span, now - i * span]`.
    fn bucket_amounts(
        &self,
        filter: &TipFilter,
        timespan: Timespan,
        buckets: usize,
        now: i64,
    ) -> StorageResult<Vec<f64>>;

    /// Per-subreddit totals over tips matching the filter, largest reference amount first
    fn subreddit_totals(
        &self,
        filter: &TipFilter,
        limit: usize,
    ) -> StorageResult<Vec<SubredditTotal>>;
}
