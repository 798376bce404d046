//! SKU Harvester: a catalog crawler for SKU group mappings
//!
//! This crate crawls a paginated public catalog, maps every SKU ID it finds to
//! the SKU group page it was listed on, and writes the mapping to CSV with
//! periodic checkpoints. A statistics pass over a finished mapping is included.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No SKU group links found on {landing_url}")]
    NoGroupsFound { landing_url: String },

    #[error("Failed to process SKU group {group}: {message}")]
    UnitFailed { group: String, message: String },
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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, HarvestSummary};
pub use record::{GroupTarget, SkuRecord};
