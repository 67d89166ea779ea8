//! Persisted run artifacts: the summary table and the chart projection

use crate::config::ANIMATION_FILE;
use crate::types::{NdviError, NdviResult, SeriesRow};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Summary table row as found on disk; any column may be blank
#[derive(Debug, Deserialize)]
struct SummaryRecord {
    file: Option<String>,
    year: Option<i32>,
    doy: Option<u32>,
    date_iso: Option<String>,
    mean_ndvi: Option<f64>,
    valid_fraction: Option<f64>,
}

impl SummaryRecord {
    fn into_row(self) -> Option<SeriesRow> {
        let mean_ndvi = self.mean_ndvi.filter(|v| v.is_finite())?;
        Some(SeriesRow {
            file: self.file.unwrap_or_default(),
            year: self.year?,
            doy: self.doy?,
            date_iso: self.date_iso.unwrap_or_default(),
            mean_ndvi,
            valid_fraction: self.valid_fraction.unwrap_or(f64::NAN),
        })
    }
}

/// `{date, mean_ndvi}` entry of the chart projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: String,
    pub mean_ndvi: f64,
}

pub fn write_summary_csv(path: &Path, rows: &[SeriesRow]) -> NdviResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Load the summary table; rows lacking year, doy or a finite mean are dropped
pub fn read_summary_csv(path: &Path) -> NdviResult<Vec<SeriesRow>> {
    if !path.exists() {
        return Err(NdviError::InputMissing {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in reader.deserialize::<SummaryRecord>() {
        match record?.into_row() {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {} incomplete rows from {}", dropped, path.display());
    }
    log::debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn chart_points(rows: &[SeriesRow]) -> Vec<ChartPoint> {
    rows.iter()
        .map(|row| ChartPoint {
            date: row.date_iso.clone(),
            mean_ndvi: row.mean_ndvi,
        })
        .collect()
}

pub fn write_timeseries_json(path: &Path, rows: &[SeriesRow]) -> NdviResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &chart_points(rows))?;
    log::info!("Wrote chart series to {}", path.display());
    Ok(())
}

/// Rendered frame names (`frame_*.png`) in `dir`, sorted
pub fn list_frames(dir: &Path) -> NdviResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut frames: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.starts_with("frame_") && name.ends_with(".png"))
        .collect();
    frames.sort();
    Ok(frames)
}

/// Remove frames and the animation left by an earlier run
pub fn clear_rendered(dir: &Path) -> NdviResult<usize> {
    let mut removed = 0usize;
    for name in list_frames(dir)? {
        std::fs::remove_file(dir.join(name))?;
        removed += 1;
    }

    let animation = dir.join(ANIMATION_FILE);
    if animation.exists() {
        std::fs::remove_file(animation)?;
        removed += 1;
    }

    if removed > 0 {
        log::debug!("Removed {} stale rendered files from {}", removed, dir.display());
    }
    Ok(removed)
}
