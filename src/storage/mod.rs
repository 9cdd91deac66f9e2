//! Storage module for persisting harvested tips
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent, page-atomic tip insertion keyed by comment fullname
//! - Run tracking
//! - Aggregate queries for reporting

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;
pub use traits::{StorageError, StorageResult, TipStore};

use crate::HarvestError;
use rusqlite::types::Value;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Result of a single insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Result of flushing one page of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub duplicates: u64,
}

impl BatchOutcome {
    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Duplicate => self.duplicates += 1,
        }
    }
}

/// Narrows aggregate queries by subreddit and creation time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TipFilter {
    /// Case-insensitive subreddit name
    pub subreddit: Option<String>,
    /// Inclusive lower bound on `created_utc`
    pub since: Option<i64>,
    /// Exclusive upper bound on `created_utc`
    pub until: Option<i64>,
}

impl TipFilter {
    pub fn subreddit(name: impl Into<String>) -> Self {
        Self {
            subreddit: Some(name.into()),
            ..Self::default()
        }
    }

    /// Renders the filter as a `WHERE` clause with positional parameters
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(subreddit) = &self.subreddit {
            clauses.push("subreddit = ? COLLATE NOCASE");
            values.push(Value::Text(subreddit.clone()));
        }
        if let Some(since) = self.since {
            clauses.push("created_utc >= ?");
            values.push(Value::Integer(since));
        }
        if let Some(until) = self.until {
            clauses.push("created_utc < ?");
            values.push(Value::Integer(until));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Aggregate view over stored tips
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TipSummary {
    pub count: u64,
    pub total_native: f64,
    pub total_reference: f64,
    pub average_reference: Option<f64>,
}

/// Tip count and totals for one subreddit
#[derive(Debug, Clone, PartialEq)]
pub struct SubredditTotal {
    pub subreddit: String,
    pub count: u64,
    pub total_reference: f64,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub start_page: u32,
    pub timespan: String,
    pub status: RunStatus,
    pub pages: u32,
    pub inserted: u64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
