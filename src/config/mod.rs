//! Configuration module for Tip-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing keys fall back to the defaults that match
//! the public bitcointip listing and reddit metadata endpoints.
//!
//! # Example
//!
//! ```no_run
//! use tip_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting with {} workers", config.harvest.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EndpointConfig, HarvestConfig, OutputConfig, PermalinkConfig, Timespan,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
