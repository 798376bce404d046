//! Crawler module for SKU group discovery and extraction
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with an explicit retry state machine
//! - Landing page parsing for SKU group links
//! - Table parsing and SKU ID validation
//! - Bounded concurrent extraction and overall coordination

mod coordinator;
mod delay;
mod extractor;
mod fetcher;
mod groups;
mod parser;
mod retry;

pub use coordinator::{run_harvest, Coordinator, HarvestSummary};
pub use delay::{random_between, Sleeper, TokioSleeper};
pub use extractor::{unique_records, SkuExtractor};
pub use fetcher::{build_http_client, FetchResult, FetchedPage, Fetcher};
pub use groups::{discover_groups, parse_group_links};
pub use parser::{
    accept_sku_candidate, detect_sku_column, parse_continuation_page, parse_group_page,
    resolve_link, ColumnRule, GroupPage, SkuColumn, SKU_HEADER_VARIANTS,
};
pub use retry::{AttemptFailure, RetryPolicy, RetryState};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest operation
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the HTTP client
/// 2. Discover SKU group pages on the landing page
/// 3. Extract SKU IDs from every group concurrently
/// 4. Write checkpoints and the final mapping
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(HarvestSummary)` - Harvest completed and the mapping was written
/// * `Err(HarvestError)` - Harvest failed
pub async fn harvest(config: Config) -> Result<HarvestSummary, HarvestError> {
    run_harvest(config).await
}
