//! Tip-Harvest: a deduplicating tip ingestion pipeline
//!
//! This crate pages through a public tip listing, resolves every listed tip
//! through a chain of dependent lookups (comment thread, tip detail, comment
//! metadata) and stores each resolved tip exactly once in SQLite.

pub mod config;
pub mod harvest;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tip-Harvest operations
///
/// Per-row failures never show up here; they are carried as
/// [`state::DropReason`] values and absorbed at the row level.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Harvest interrupted at page {page}")]
    Interrupted { page: u32 },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL template in config: {0}")]
    InvalidTemplate(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Permalink has no subreddit segment: {0}")]
    MissingSubreddit(String),

    #[error("Permalink is missing segment {index}: {url}")]
    MissingSegment { url: String, index: usize },
}

/// Result type alias for Tip-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, Timespan};
pub use harvest::{Coordinator, RunOptions, RunSummary, Shutdown, ShutdownTrigger};
pub use state::{CommentId, DropReason, RowState, TipRecord};
pub use storage::{SqliteStorage, TipStore};
