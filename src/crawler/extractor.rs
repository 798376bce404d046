//! Per-group SKU extraction with one level of pagination

use crate::config::HarvestConfig;
use crate::crawler::delay::{random_between, Sleeper};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{parse_continuation_page, parse_group_page, GroupPage};
use crate::record::{GroupTarget, SkuRecord};
use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Duration;

/// Extracts the SKU records listed on one group page
pub struct SkuExtractor {
    fetcher: Arc<Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    pagination_delay_min: Duration,
    pagination_delay_max: Duration,
}

impl SkuExtractor {
    pub fn new(fetcher: Arc<Fetcher>, sleeper: Arc<dyn Sleeper>, config: &HarvestConfig) -> Self {
        Self {
            fetcher,
            sleeper,
            pagination_delay_min: Duration::from_millis(config.pagination_delay_min_ms),
            pagination_delay_max: Duration::from_millis(config.pagination_delay_max_ms),
        }
    }

    /// Extracts unique SKU IDs for a group, in first-seen order
    ///
    /// # Process
    ///
    /// 1. Fetch the group page; a failed fetch yields no records
    /// 2. Scan every table with header-based column detection
    /// 3. For each pagination link leading elsewhere, wait a randomized delay,
    ///    fetch it, and scan its tables using the first column only
    /// 4. Drop repeated SKU IDs, keeping the first occurrence
    ///
    /// Continuation pages are not searched for further pagination.
    pub async fn extract(&self, target: &GroupTarget) -> Vec<SkuRecord> {
        tracing::info!("Processing SKU group: {}", target.group_name);

        let Some(page) = self
            .fetcher
            .fetch(target.group_url.as_str())
            .await
            .into_page()
        else {
            tracing::warn!(
                "No data for SKU group {}: page could not be fetched",
                target.group_name
            );
            return Vec::new();
        };

        let GroupPage {
            mut sku_ids,
            pagination,
        } = parse_group_page(&page.body, &target.group_url);

        // One level only: continuation pages are not searched for more links
        for next_url in pagination {
            tracing::info!(
                "Found pagination link, processing next page: {}",
                next_url
            );
            self.sleeper
                .sleep(random_between(
                    self.pagination_delay_min,
                    self.pagination_delay_max,
                ))
                .await;

            if let Some(continuation) = self.fetcher.fetch(next_url.as_str()).await.into_page() {
                sku_ids.extend(parse_continuation_page(&continuation.body));
            }
        }

        let records = unique_records(&target.group_name, sku_ids);
        tracing::info!(
            "Found {} SKU IDs for {}",
            records.len(),
            target.group_name
        );
        records
    }
}

/// Pairs each distinct SKU ID with the group, keeping first-seen order
pub fn unique_records(group_name: &str, sku_ids: Vec<String>) -> Vec<SkuRecord> {
    sku_ids
        .into_iter()
        .collect::<IndexSet<_>>()
        .into_iter()
        .map(|sku_id| SkuRecord::new(sku_id, group_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unique_records_preserves_first_seen_order() {
        let records = unique_records("Compute", ids(&["B-2", "A-1", "B-2", "C-3", "A-1"]));
        let sku_ids: Vec<_> = records.iter().map(|r| r.sku_id.as_str()).collect();
        assert_eq!(sku_ids, vec!["B-2", "A-1", "C-3"]);
        assert!(records.iter().all(|r| r.sku_group == "Compute"));
    }

    #[test]
    fn test_unique_records_empty() {
        assert!(unique_records("Compute", Vec::new()).is_empty());
    }
}
