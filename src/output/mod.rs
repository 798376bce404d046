//! Output module for persisting and summarizing the SKU mapping
//!
//! This module handles:
//! - Writing the final mapping and checkpoint snapshots as CSV
//! - Reading a finished mapping back and reporting statistics

mod mapping;
pub mod stats;

pub use mapping::{checkpoint_path, write_checkpoint, write_mapping, write_records};
pub use stats::{
    analyze_mapping, analyze_reader, print_statistics, render_statistics, report_mapping,
    MappingStatistics, StatsError,
};
