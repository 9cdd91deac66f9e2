//! Row resolution state definitions
//!
//! Every listing row starts `Pending` and ends either `Dropped` with a reason
//! or `Resolved` with the record that will be handed to the store.

use crate::state::TipRecord;
use std::fmt;

/// Why a listing row produced no record
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The row's subreddit is on the exclusion list
    ExcludedSubreddit(String),

    /// The permalink does not have the expected shape
    MalformedPermalink(String),

    /// A network hop failed or returned a non-success status
    Unavailable { url: String, reason: String },

    /// The comment page held no comment carrying an identifier
    NoCandidates,

    /// Several candidates, none containing the marker
    NoMarkerMatch { candidates: usize },

    /// The detail endpoint reported zero tips for the comment
    NoTipData,

    /// The metadata endpoint returned no item for the comment
    NoTimestamp,

    /// An endpoint answered with a body that could not be decoded
    MalformedResponse { url: String, reason: String },

    /// All lookups succeeded but the assembled record is not storable
    InvalidRecord(String),
}

impl DropReason {
    /// Short stable label used in logs and counters
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExcludedSubreddit(_) => "excluded_subreddit",
            Self::MalformedPermalink(_) => "malformed_permalink",
            Self::Unavailable { .. } => "unavailable",
            Self::NoCandidates => "no_candidates",
            Self::NoMarkerMatch { .. } => "no_marker_match",
            Self::NoTipData => "no_tip_data",
            Self::NoTimestamp => "no_timestamp",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::InvalidRecord(_) => "invalid_record",
        }
    }

    /// Returns true if the drop came from a failed network hop
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedSubreddit(name) => write!(f, "subreddit r/{} is excluded", name),
            Self::MalformedPermalink(reason) => write!(f, "malformed permalink: {}", reason),
            Self::Unavailable { url, reason } => write!(f, "{} unavailable: {}", url, reason),
            Self::NoCandidates => write!(f, "no comment candidates in thread"),
            Self::NoMarkerMatch { candidates } => {
                write!(f, "none of {} candidates carries the marker", candidates)
            }
            Self::NoTipData => write!(f, "detail endpoint returned no tips"),
            Self::NoTimestamp => write!(f, "metadata endpoint returned no items"),
            Self::MalformedResponse { url, reason } => {
                write!(f, "malformed response from {}: {}", url, reason)
            }
            Self::InvalidRecord(reason) => write!(f, "invalid record: {}", reason),
        }
    }
}

/// Resolution state of one listing row
#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Pending,
    Dropped(DropReason),
    Resolved(TipRecord),
}

impl RowState {
    /// Returns true once the row can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Takes the record out of a resolved row
    pub fn into_record(self) -> Option<TipRecord> {
        match self {
            Self::Resolved(record) => Some(record),
            _ => None,
        }
    }

    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            Self::Dropped(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<Result<TipRecord, DropReason>> for RowState {
    fn from(result: Result<TipRecord, DropReason>) -> Self {
        match result {
            Ok(record) => Self::Resolved(record),
            Err(reason) => Self::Dropped(reason),
        }
    }
}
