//! Permalink handling
//!
//! Listing rows point at a tipping context on reddit. This module decides
//! which part of the comment page has to be searched for the confirmation
//! reply and extracts the subreddit a permalink belongs to.

mod permalink;

pub use permalink::{subreddit_from_permalink, PermalinkLayout, ThreadScope};
