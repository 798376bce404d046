use serde::Deserialize;
use std::time::Duration;

/// Default landing page listing every SKU group
pub const DEFAULT_LANDING_URL: &str = "https://cloud.google.com/skus/sku-groups";

/// Default origin used to resolve relative group links
pub const DEFAULT_ORIGIN: &str = "https://cloud.google.com";

/// Path fragment identifying a group page link
pub const DEFAULT_GROUP_PATH_SEGMENT: &str = "skus/sku-groups/";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Main configuration structure for the harvester
///
/// Every section is optional; an absent section takes the compiled-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub harvest: HarvestConfig,
    pub output: OutputConfig,
}

/// Catalog site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Page listing every SKU group
    pub landing_url: String,

    /// Origin that relative group links are resolved against
    pub origin: String,

    /// Substring an href must contain to count as a group link
    pub group_path_segment: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            landing_url: DEFAULT_LANDING_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            group_path_segment: DEFAULT_GROUP_PATH_SEGMENT.to_string(),
        }
    }
}

/// HTTP request and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Total attempts per URL, including the first
    pub max_retries: u32,

    /// Base delay between attempts (milliseconds)
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Worker pool, checkpointing and politeness delays
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Number of groups processed concurrently
    pub max_workers: u32,

    /// Write a checkpoint after every N completed groups
    pub checkpoint_interval: u32,

    /// Jitter slept by each unit before it starts (milliseconds)
    pub unit_jitter_min_ms: u64,
    pub unit_jitter_max_ms: u64,

    /// Delay before fetching each pagination link (milliseconds)
    pub pagination_delay_min_ms: u64,
    pub pagination_delay_max_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            checkpoint_interval: 10,
            unit_jitter_min_ms: 500,
            unit_jitter_max_ms: 1500,
            pagination_delay_min_ms: 1000,
            pagination_delay_max_ms: 2000,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Final SKU ID to SKU group mapping
    pub mapping_path: String,

    /// Directory receiving checkpoint snapshots
    pub checkpoint_dir: String,

    /// Log file written alongside console output
    pub log_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mapping_path: "sku_id_to_group_mapping.csv".to_string(),
            checkpoint_dir: "temp_data".to_string(),
            log_path: "scraper.log".to_string(),
        }
    }
}
