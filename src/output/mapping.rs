//! CSV persistence for the SKU mapping and its checkpoints

use crate::record::{SkuRecord, MAPPING_HEADER};
use crate::HarvestError;
use csv::Writer;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes records as mapping CSV to any writer
///
/// The header is always written, even when there are no records. Records
/// with an empty SKU ID are never emitted.
pub fn write_records<W: std::io::Write>(
    writer: W,
    records: &[SkuRecord],
) -> Result<usize, HarvestError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(MAPPING_HEADER)?;

    let mut written = 0;
    for record in records {
        if record.sku_id.is_empty() {
            tracing::debug!("Dropping record with empty SKU ID in {}", record.sku_group);
            continue;
        }
        wtr.write_record([record.sku_id.as_str(), record.sku_group.as_str()])?;
        written += 1;
    }

    wtr.flush()?;
    Ok(written)
}

/// Writes the final mapping, replacing any previous file at `path`
///
/// The CSV is written to a sibling `.partial` file first and renamed into
/// place, so readers never observe a truncated mapping.
pub fn write_mapping(path: &Path, records: &[SkuRecord]) -> Result<usize, HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // Write beside the target, then swap it in
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let written = write_records(File::create(&partial)?, records)?;
    std::fs::rename(&partial, path)?;

    tracing::info!("Wrote {} SKU IDs to {}", written, path.display());
    Ok(written)
}

/// Path of the checkpoint written after `completed` groups
pub fn checkpoint_path(dir: &Path, completed: usize) -> PathBuf {
    dir.join(format!("checkpoint_{}.csv", completed))
}

/// Writes a snapshot of every record accumulated so far
pub fn write_checkpoint(
    dir: &Path,
    completed: usize,
    records: &[SkuRecord],
) -> Result<PathBuf, HarvestError> {
    std::fs::create_dir_all(dir)?;
    let path = checkpoint_path(dir, completed);

    let written = write_records(File::create(&path)?, records)?;
    tracing::info!(
        "Checkpoint saved: {} SKU IDs saved to {}",
        written,
        path.display()
    );

    Ok(path)
}
