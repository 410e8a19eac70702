//! Timestamped parquet snapshots of the data-lake layers.
//!
//! Snapshots are a side effect of a run: typed rows are serialized through
//! `serde_arrow` into an Arrow batch and written with the parquet
//! `ArrowWriter`, one file per layer per run.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::datatypes::FieldRef;
use chrono::Local;
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::Result;

/// Write rows as `<dir>/<prefix>_<timestamp>.parquet`.
///
/// Empty inputs produce no file (`Ok(None)`): there is nothing worth
/// snapshotting and `serde_arrow` cannot trace a schema from zero samples.
pub fn write_parquet<T: Serialize>(
    rows: &[T],
    dir: &Path,
    prefix: &str,
) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;

    let fields = Vec::<FieldRef>::from_samples(
        &rows,
        TracingOptions::default().allow_null_fields(true),
    )?;
    let batch = serde_arrow::to_record_batch(&fields, &rows)?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{prefix}_{ts}.parquet"));
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    info!("Snapshot written: {}", path.display());
    Ok(Some(path))
}

/// Write a raw bronze table as `<dir>/<prefix>_<timestamp>.json`.
///
/// Bronze rows are loose JSON maps with no stable schema to trace, so the
/// raw layer is snapshotted as JSON rather than parquet.
pub fn write_json(rows: &crate::schema::RawTable, dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{prefix}_{ts}.json"));
    let file = File::create(&path)?;
    serde_json::to_writer(file, rows)?;

    info!("Snapshot written: {}", path.display());
    Ok(Some(path))
}
