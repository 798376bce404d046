//! Statistics over a finished SKU mapping CSV
//!
//! This module reads a mapping produced by the harvester and reports group
//! sizes and SKU ID shapes. Malformed rows are skipped; a missing or empty
//! file is reported without panicking.

use crate::record::MAPPING_HEADER;
use indexmap::IndexMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of groups listed in the "top groups" section
pub const TOP_GROUPS: usize = 10;

/// Errors that can occur while reading a mapping
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("File '{}' not found.", .0.display())]
    Missing(PathBuf),

    #[error("File is empty: no header row found")]
    Empty,

    #[error("Error analyzing CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate view of a SKU mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingStatistics {
    /// Whether the header row was exactly `SKU ID,SKU Group`
    pub header_matches: bool,

    /// Number of data rows with at least two fields
    pub total_records: usize,

    /// Records per group, in first-seen order
    pub group_counts: IndexMap<String, usize>,

    /// SKU IDs per hyphen-delimited segment count, in first-seen order
    pub segment_counts: IndexMap<usize, usize>,
}

impl MappingStatistics {
    pub fn distinct_groups(&self) -> usize {
        self.group_counts.len()
    }

    /// Largest groups first; equal sizes keep first-seen order
    pub fn top_groups(&self, limit: usize) -> Vec<(&str, usize)> {
        sorted_by_count(self.group_counts.iter().map(|(g, c)| (g.as_str(), *c)))
            .into_iter()
            .take(limit)
            .collect()
    }

    pub fn singleton_groups(&self) -> usize {
        self.group_counts.values().filter(|&&c| c == 1).count()
    }

    pub fn singleton_percentage(&self) -> f64 {
        percentage(self.singleton_groups(), self.distinct_groups())
    }

    pub fn average_per_group(&self) -> f64 {
        if self.group_counts.is_empty() {
            return 0.0;
        }
        self.total_records as f64 / self.distinct_groups() as f64
    }

    /// Segment counts, most common first, with their share of all records
    pub fn segment_distribution(&self) -> Vec<(usize, usize, f64)> {
        sorted_by_count(self.segment_counts.iter().map(|(s, c)| (*s, *c)))
            .into_iter()
            .map(|(segments, count)| (segments, count, percentage(count, self.total_records)))
            .collect()
    }
}

fn sorted_by_count<K>(entries: impl Iterator<Item = (K, usize)>) -> Vec<(K, usize)> {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

/// Reads mapping statistics from a CSV file
pub fn analyze_mapping(path: &Path) -> Result<MappingStatistics, StatsError> {
    if !path.exists() {
        return Err(StatsError::Missing(path.to_path_buf()));
    }
    analyze_reader(File::open(path)?)
}

/// Reads mapping statistics from any CSV source
pub fn analyze_reader<R: Read>(source: R) -> Result<MappingStatistics, StatsError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);
    let mut rows = reader.records();

    let header = rows.next().ok_or(StatsError::Empty)??;
    let header_matches = header.len() == MAPPING_HEADER.len()
        && header.iter().zip(MAPPING_HEADER).all(|(a, b)| a == b);
    if !header_matches {
        tracing::warn!(
            "CSV header doesn't match expected format. Found: {:?}",
            header.iter().collect::<Vec<_>>()
        );
    }

    let mut stats = MappingStatistics {
        header_matches,
        ..MappingStatistics::default()
    };

    for row in rows {
        let row = row?;
        let (Some(sku_id), Some(sku_group)) = (row.get(0), row.get(1)) else {
            continue;
        };

        stats.total_records += 1;
        *stats.group_counts.entry(sku_group.to_string()).or_insert(0) += 1;
        *stats
            .segment_counts
            .entry(sku_id.split('-').count())
            .or_insert(0) += 1;
    }

    Ok(stats)
}

/// Formats statistics as the plain-text report printed by `--stats`
pub fn render_statistics(stats: &MappingStatistics) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, stats);
    out
}

fn write_report(out: &mut impl fmt::Write, stats: &MappingStatistics) -> fmt::Result {
    writeln!(out, "\n=== SKU ID to SKU Group Mapping Analysis ===\n")?;
    writeln!(out, "Total SKU IDs: {}", stats.total_records)?;
    writeln!(out, "Total SKU Groups: {}", stats.distinct_groups())?;

    writeln!(out, "\nTop {} SKU Groups by number of SKU IDs:", TOP_GROUPS)?;
    for (group, count) in stats.top_groups(TOP_GROUPS) {
        writeln!(out, "  {}: {} SKU IDs", group, count)?;
    }

    writeln!(out, "\nGroups with only one SKU ID:")?;
    writeln!(
        out,
        "  {} groups ({:.1}% of all groups)",
        stats.singleton_groups(),
        stats.singleton_percentage()
    )?;

    writeln!(
        out,
        "\nAverage SKU IDs per group: {:.2}",
        stats.average_per_group()
    )?;

    // Hyphen-delimited segments per SKU ID, most common shape first
    writeln!(out, "\nSKU ID format analysis:")?;
    for (segments, count, share) in stats.segment_distribution() {
        writeln!(
            out,
            "  {} segment(s): {} SKU IDs ({:.1}%)",
            segments, count, share
        )?;
    }

    Ok(())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &MappingStatistics) {
    print!("{}", render_statistics(stats));
}

/// Analyzes a mapping file and prints the report
///
/// Failures are printed as an error message; this never panics on bad input.
pub fn report_mapping(path: &Path) -> bool {
    match analyze_mapping(path) {
        Ok(stats) => {
            print_statistics(&stats);
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}
