//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the TipStore trait.

use crate::config::Timespan;
use crate::state::{CommentId, TipRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TipStore};
use crate::storage::{
    BatchOutcome, InsertOutcome, RunRecord, RunStatus, SubredditTotal, TipFilter, TipSummary,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another process holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const INSERT_TIP_SQL: &str = "INSERT INTO tips
    (id, amount_native, amount_reference, created_utc, sender, receiver, subreddit, harvested_at, run_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO NOTHING";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, start_page, timespan, status, pages, inserted";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and ensures the schema exists
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // WAL lets reporting readers run while a harvest writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Inserts one record, returning whether a new row was written
fn insert_tip(
    conn: &Connection,
    record: &TipRecord,
    run_id: Option<i64>,
    harvested_at: &str,
) -> StorageResult<InsertOutcome> {
    let changed = conn.execute(
        INSERT_TIP_SQL,
        params![
            record.id.fullname(),
            record.amount_native,
            record.amount_reference,
            record.created_utc,
            record.sender,
            record.receiver,
            record.subreddit,
            harvested_at,
            run_id,
        ],
    )?;

    if changed == 0 {
        tracing::info!(id = %record.id, "Tip already stored, skipping");
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::Inserted)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        start_page: row.get(4)?,
        timespan: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Failed),
        pages: row.get(7)?,
        inserted: row.get::<_, i64>(8)? as u64,
    })
}

impl TipStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        config_hash: &str,
        start_page: u32,
        timespan: Timespan,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, start_page, timespan, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now,
                config_hash,
                start_page,
                timespan.as_str(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages: u32,
        inserted: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages = ?3, inserted = ?4 WHERE id = ?5",
            params![status.to_db_string(), now, pages, inserted as i64, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Tip Ingestion =====

    fn insert_if_absent(
        &mut self,
        record: &TipRecord,
        run_id: Option<i64>,
    ) -> StorageResult<InsertOutcome> {
        let now = Utc::now().to_rfc3339();
        insert_tip(&self.conn, record, run_id, &now)
    }

    fn insert_batch(
        &mut self,
        records: &[TipRecord],
        run_id: Option<i64>,
    ) -> StorageResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let now = Utc::now().to_rfc3339();
        // Take the write lock up front so concurrent runs queue on busy_timeout
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for record in records {
            outcome.record(insert_tip(&tx, record, run_id, &now)?);
        }
        tx.commit()?;

        Ok(outcome)
    }

    fn get_tip(&self, id: &str) -> StorageResult<Option<TipRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, amount_native, amount_reference, created_utc, sender, receiver, subreddit
                 FROM tips WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (fullname, amount_native, amount_reference, created_utc, sender, receiver, subreddit) =
            row;

        let id = CommentId::parse(&fullname)
            .ok_or_else(|| StorageError::Corrupt(format!("invalid tip id '{}'", fullname)))?;

        Ok(Some(TipRecord {
            id,
            amount_native,
            amount_reference,
            created_utc,
            sender,
            receiver,
            subreddit,
        }))
    }

    // ===== Aggregates =====

    fn count_tips(&self, filter: &TipFilter) -> StorageResult<u64> {
        let (clause, values) = filter.to_sql();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tips{}", clause),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn summarize(&self, filter: &TipFilter) -> StorageResult<TipSummary> {
        let (clause, values) = filter.to_sql();
        let summary = self.conn.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(amount_native), 0.0),
                 COALESCE(SUM(amount_reference), 0.0), AVG(amount_reference)
                 FROM tips{}",
                clause
            ),
            params_from_iter(values),
            |row| {
                Ok(TipSummary {
                    count: row.get::<_, i64>(0)? as u64,
                    total_native: row.get(1)?,
                    total_reference: row.get(2)?,
                    average_reference: row.get(3)?,
                })
            },
        )?;
        Ok(summary)
    }

    fn bucket_amounts(
        &self,
        filter: &TipFilter,
        timespan: Timespan,
        buckets: usize,
        now: i64,
    ) -> StorageResult<Vec<f64>> {
        let mut totals = vec![0.0; buckets];
        if buckets == 0 {
            return Ok(totals);
        }

        let span = timespan.seconds();
        let oldest = now - span * buckets as i64;

        // Intersect the caller's range with the bucketed window (oldest, now]
        let window = TipFilter {
            subreddit: filter.subreddit.clone(),
            since: Some(filter.since.map_or(oldest + 1, |s| s.max(oldest + 1))),
            until: Some(filter.until.map_or(now + 1, |u| u.min(now + 1))),
        };
        let (clause, values) = window.to_sql();

        let mut stmt = self.conn.prepare(&format!(
            "SELECT created_utc, amount_reference FROM tips{}",
            clause
        ))?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;

        for row in rows {
            let (created_utc, amount) = row?;
            let index = ((now - created_utc) / span) as usize;
            if let Some(total) = totals.get_mut(index) {
                *total += amount;
            }
        }

        Ok(totals)
    }

    fn subreddit_totals(
        &self,
        filter: &TipFilter,
        limit: usize,
    ) -> StorageResult<Vec<SubredditTotal>> {
        let (clause, mut values) = filter.to_sql();
        values.push(Value::Integer(limit as i64));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT subreddit, COUNT(*), SUM(amount_reference) AS total
             FROM tips{} GROUP BY subreddit COLLATE NOCASE
             ORDER BY total DESC, subreddit ASC LIMIT ?",
            clause
        ))?;

        let totals = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(SubredditTotal {
                    subreddit: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    total_reference: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(totals)
    }
}
