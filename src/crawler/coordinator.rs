//! Harvest coordinator - main orchestration logic
//!
//! This module contains the run loop that coordinates the whole harvest:
//! - Discovering SKU group pages on the landing page
//! - Dispatching each group to a bounded pool of extraction tasks
//! - Accumulating results in completion order
//! - Writing periodic checkpoints and the final mapping

use crate::config::Config;
use crate::crawler::delay::{random_between, Sleeper, TokioSleeper};
use crate::crawler::extractor::SkuExtractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::groups::discover_groups;
use crate::output::{write_checkpoint, write_mapping};
use crate::record::{GroupTarget, SkuRecord};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of a completed harvest run
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// Group targets found on the landing page
    pub groups_discovered: usize,

    /// Groups that contributed no records (fetch failures, empty pages, faults)
    pub empty_groups: usize,

    /// Units that failed unexpectedly and were downgraded to empty results
    pub failed_units: usize,

    /// Records written to the final mapping
    pub total_records: usize,

    /// Checkpoint files written, in order
    pub checkpoints: Vec<PathBuf>,

    /// Location of the final mapping
    pub output_path: PathBuf,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result returned by one unit of work
struct UnitOutcome {
    group_name: Option<String>,
    result: Result<Vec<SkuRecord>, HarvestError>,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    extractor: Arc<SkuExtractor>,
    sleeper: Arc<dyn Sleeper>,
}

impl Coordinator {
    /// Creates a coordinator that sleeps on the tokio timer
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        Self::with_sleeper(config, Arc::new(TokioSleeper))
    }

    /// Creates a coordinator whose waits all go through `sleeper`
    pub fn with_sleeper(config: Config, sleeper: Arc<dyn Sleeper>) -> Result<Self, HarvestError> {
        let fetcher = Arc::new(Fetcher::new(&config.http, sleeper.clone())?);
        let extractor = Arc::new(SkuExtractor::new(
            fetcher.clone(),
            sleeper.clone(),
            &config.harvest,
        ));

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            extractor,
            sleeper,
        })
    }

    /// Runs the harvest
    ///
    /// 1. Creates the checkpoint directory
    /// 2. Discovers group targets; none found is fatal and nothing is written
    /// 3. Runs one extraction unit per target, at most `max-workers` at a time,
    ///    each starting after a randomized jitter
    /// 4. Appends each unit's records as it completes and writes a checkpoint
    ///    every `checkpoint-interval` completions
    /// 5. Writes the final mapping, replacing any previous output
    ///
    /// A failing unit contributes no records and never stops the run.
    pub async fn run(&self) -> Result<HarvestSummary, HarvestError> {
        let started_at = Utc::now();
        tracing::info!("Starting the SKU ID extraction process");

        let checkpoint_dir = PathBuf::from(&self.config.output.checkpoint_dir);
        std::fs::create_dir_all(&checkpoint_dir)?;

        // Without group links there is nothing to harvest
        let targets = discover_groups(&self.fetcher, &self.config.site).await?;
        if targets.is_empty() {
            tracing::error!("No SKU group links found. Exiting.");
            return Err(HarvestError::NoGroupsFound {
                landing_url: self.config.site.landing_url.clone(),
            });
        }

        let groups_discovered = targets.len();
        let checkpoint_interval = self.config.harvest.checkpoint_interval.max(1) as usize;
        let mut units = self.dispatch(targets);

        let mut records: Vec<SkuRecord> = Vec::new();
        let mut checkpoints = Vec::new();
        let mut completed = 0usize;
        let mut empty_groups = 0usize;
        let mut failed_units = 0usize;

        // Single writer: only this loop touches the accumulated records
        while let Some(joined) = units.join_next().await {
            let outcome = joined.unwrap_or_else(|e| UnitOutcome {
                group_name: None,
                result: Err(HarvestError::UnitFailed {
                    group: "<unknown>".to_string(),
                    message: e.to_string(),
                }),
            });

            match outcome.result {
                Ok(group_records) => {
                    if group_records.is_empty() {
                        empty_groups += 1;
                    }
                    records.extend(group_records);
                }
                Err(e) => {
                    tracing::error!(
                        "Error processing {}: {}",
                        outcome.group_name.as_deref().unwrap_or("<unknown>"),
                        e
                    );
                    failed_units += 1;
                    empty_groups += 1;
                }
            }
            completed += 1;

            // Snapshot everything gathered so far
            if completed % checkpoint_interval == 0 {
                match write_checkpoint(&checkpoint_dir, completed, &records) {
                    Ok(path) => checkpoints.push(path),
                    Err(e) => tracing::warn!("Failed to write checkpoint {}: {}", completed, e),
                }
                tracing::info!(
                    "Progress: {}/{} SKU groups processed",
                    completed,
                    groups_discovered
                );
            }
        }

        let output_path = PathBuf::from(&self.config.output.mapping_path);
        tracing::info!(
            "Writing {} SKU IDs to {}",
            records.len(),
            output_path.display()
        );
        let total_records = write_mapping(&output_path, &records)?;

        let finished_at = Utc::now();
        tracing::info!(
            "Process completed successfully in {}s: {} groups, {} empty, {} failed",
            (finished_at - started_at).num_seconds(),
            groups_discovered,
            empty_groups,
            failed_units
        );

        Ok(HarvestSummary {
            groups_discovered,
            empty_groups,
            failed_units,
            total_records,
            checkpoints,
            output_path,
            started_at,
            finished_at,
        })
    }

    /// Spawns one unit per target, gated by the worker pool semaphore
    ///
    /// Units return their records; only the coordinator appends them.
    fn dispatch(&self, targets: Vec<GroupTarget>) -> JoinSet<UnitOutcome> {
        let pool = Arc::new(Semaphore::new(self.config.harvest.max_workers.max(1) as usize));
        let jitter_min = Duration::from_millis(self.config.harvest.unit_jitter_min_ms);
        let jitter_max = Duration::from_millis(self.config.harvest.unit_jitter_max_ms);

        let mut units = JoinSet::new();
        for target in targets {
            let pool = pool.clone();
            let extractor = self.extractor.clone();
            let sleeper = self.sleeper.clone();

            units.spawn(async move {
                let group_name = target.group_name.clone();

                // Wait for a free worker slot
                let Ok(_permit) = pool.acquire_owned().await else {
                    return UnitOutcome {
                        group_name: Some(group_name.clone()),
                        result: Err(HarvestError::UnitFailed {
                            group: group_name,
                            message: "worker pool closed".to_string(),
                        }),
                    };
                };

                // The whole unit runs in its own task so a panic is contained here
                let unit = tokio::spawn(async move {
                    sleeper.sleep(random_between(jitter_min, jitter_max)).await;
                    extractor.extract(&target).await
                });
                let result = unit.await.map_err(|e| HarvestError::UnitFailed {
                    group: group_name.clone(),
                    message: e.to_string(),
                });

                UnitOutcome {
                    group_name: Some(group_name),
                    result,
                }
            });
        }

        units
    }
}

/// Runs a complete harvest with the given configuration
///
/// # Example
///
/// ```no_run
/// use sku_harvester::config::Config;
/// use sku_harvester::crawler::run_harvest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let summary = run_harvest(Config::default()).await?;
/// println!("{} records", summary.total_records);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<HarvestSummary, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
