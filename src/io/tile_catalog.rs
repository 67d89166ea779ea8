use crate::types::{NdviError, NdviResult, RasterTile};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Acquisition token, e.g. `A2020001` (year 2020, day 001)
fn acquisition_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"^[A-Za-z](\d{4})(\d{3})$").expect("static regex"))
}

/// Parse year and day-of-year from a MODIS style name
///
/// `MOD13Q1.A2020001.h08v05.061.2020326033640.hdf` → `(2020, 1)`
pub fn parse_tile_name(file_name: &str) -> NdviResult<(i32, u32)> {
    let token = file_name
        .split('.')
        .nth(1)
        .ok_or_else(|| NdviError::InvalidFileName(file_name.to_string()))?;

    let caps = acquisition_token()
        .captures(token)
        .ok_or_else(|| NdviError::InvalidFileName(file_name.to_string()))?;

    let year: i32 = caps[1]
        .parse()
        .map_err(|_| NdviError::InvalidFileName(file_name.to_string()))?;
    let doy: u32 = caps[2]
        .parse()
        .map_err(|_| NdviError::InvalidFileName(file_name.to_string()))?;

    Ok((year, doy))
}

/// Build the tile descriptor for a container path
pub fn tile_from_path(path: &Path) -> NdviResult<RasterTile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| NdviError::InvalidFileName(path.display().to_string()))?
        .to_string();

    let (year, doy) = parse_tile_name(&file_name)?;
    let date = NaiveDate::from_yo_opt(year, doy).ok_or_else(|| {
        NdviError::InvalidFileName(format!("{} (day {} does not exist in {})", file_name, doy, year))
    })?;

    Ok(RasterTile {
        path: path.to_path_buf(),
        file_name,
        year,
        doy,
        date,
    })
}

/// Container files in `dir` with the given extension, sorted by file name
pub fn discover_tiles(dir: &Path, extension: &str) -> NdviResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log::info!("Found {} .{} files in {}", files.len(), extension, dir.display());
    Ok(files)
}
