//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every value has a compiled-in default, so running without a file crawls the
//! public SKU group catalog.
//!
//! # Example
//!
//! ```no_run
//! use sku_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Landing page: {}", config.site.landing_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HarvestConfig, HttpConfig, OutputConfig, SiteConfig, DEFAULT_GROUP_PATH_SEGMENT,
    DEFAULT_LANDING_URL, DEFAULT_ORIGIN,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
