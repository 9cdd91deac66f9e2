//! Output module for reporting on harvested tips
//!
//! This module handles:
//! - Loading aggregate statistics from the tip store
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, TipStatistics};
