use crate::state::DropReason;
use std::fmt;

/// A prefixed reddit comment identifier such as `t1_c9xyz`
///
/// The full form is the store's dedup key and what the metadata endpoint
/// expects; the bare suffix is what the tip detail endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentId {
    fullname: String,
    split: usize,
}

impl CommentId {
    /// Parses `<kind>_<id>`; both halves must be non-empty alphanumerics
    pub fn parse(fullname: &str) -> Option<Self> {
        let fullname = fullname.trim();
        let (kind, id) = fullname.split_once('_')?;

        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(kind) || !valid(id) {
            return None;
        }

        Some(Self {
            fullname: fullname.to_string(),
            split: kind.len(),
        })
    }

    /// The prefixed identifier, e.g. `t1_c9xyz`
    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    /// The bare identifier, e.g. `c9xyz`
    pub fn suffix(&self) -> &str {
        &self.fullname[self.split + 1..]
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname)
    }
}

/// A fully resolved tip, immutable once stored
#[derive(Debug, Clone, PartialEq)]
pub struct TipRecord {
    pub id: CommentId,
    /// Amount in the tipped currency (BTC)
    pub amount_native: f64,
    /// Amount in the reference currency (USD)
    pub amount_reference: f64,
    /// Creation time of the tipping comment, epoch seconds
    pub created_utc: i64,
    pub sender: String,
    pub receiver: String,
    pub subreddit: String,
}

impl TipRecord {
    /// Checks the invariants every stored record must satisfy
    pub fn validate(&self) -> Result<(), DropReason> {
        if self.created_utc <= 0 {
            return Err(DropReason::InvalidRecord(format!(
                "timestamp {} is not positive",
                self.created_utc
            )));
        }

        for (name, amount) in [
            ("native", self.amount_native),
            ("reference", self.amount_reference),
        ] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(DropReason::InvalidRecord(format!(
                    "{} amount {} is negative or not finite",
                    name, amount
                )));
            }
        }

        if self.sender.trim().is_empty() || self.receiver.trim().is_empty() {
            return Err(DropReason::InvalidRecord(
                "sender and receiver must be present".to_string(),
            ));
        }

        Ok(())
    }
}
