//! Drives extraction over a tile directory and assembles the summary table

use crate::core::extract::FrameSource;
use crate::io::tile_catalog::{discover_tiles, tile_from_path};
use crate::types::{ExtractedFrame, GeoBounds, NdviError, NdviImage, NdviResult, RasterTile, SeriesRow};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Overall result of one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Ok,
    NoFiles,
    NoValidData,
}

/// Why a file contributed no row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidFileName { message: String },
    BandNotFound,
    Geometry { message: String },
    ReadFailure { message: String },
    AllMasked,
    DuplicateDate { year: i32, doy: u32 },
}

impl SkipReason {
    fn from_error(err: &NdviError) -> Self {
        match err {
            NdviError::InvalidFileName(_) => SkipReason::InvalidFileName {
                message: err.to_string(),
            },
            NdviError::BandNotFound { .. } => SkipReason::BandNotFound,
            NdviError::Geometry(message) => SkipReason::Geometry {
                message: message.clone(),
            },
            NdviError::AllMasked { .. } => SkipReason::AllMasked,
            other => SkipReason::ReadFailure {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TileStatus {
    Processed { row: SeriesRow },
    Skipped { reason: SkipReason },
}

/// Outcome for a single input file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileOutcome {
    pub file: String,
    #[serde(flatten)]
    pub status: TileStatus,
}

/// Per-file outcomes in file-name order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<TileOutcome>,
}

impl BatchReport {
    pub fn processed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TileStatus::Processed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.processed_count()
    }

    pub fn all_masked_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    TileStatus::Skipped {
                        reason: SkipReason::AllMasked
                    }
                )
            })
            .count()
    }
}

/// In-memory result of a run: the table, the matching frames and the report
#[derive(Debug, Clone)]
pub struct SeriesRun {
    pub status: ExtractionStatus,
    /// Sorted by (year, doy), unique per date
    pub rows: Vec<SeriesRow>,
    /// Clipped arrays aligned with `rows`
    pub frames: Vec<NdviImage>,
    /// Bounds of the first file (by name) with any valid pixel
    pub anchor_bounds: Option<GeoBounds>,
    pub report: BatchReport,
}

impl SeriesRun {
    pub fn message(&self) -> String {
        match self.status {
            ExtractionStatus::Ok => format!(
                "Processed {} of {} files ({} fully masked)",
                self.report.processed_count(),
                self.report.outcomes.len(),
                self.report.all_masked_count()
            ),
            ExtractionStatus::NoFiles => "No raster files found in the tile directory".to_string(),
            ExtractionStatus::NoValidData => "No valid data could be processed".to_string(),
        }
    }
}

pub struct SeriesBuilder {
    tile_dir: PathBuf,
    extension: String,
}

impl SeriesBuilder {
    pub fn new<P: AsRef<Path>>(tile_dir: P, extension: impl Into<String>) -> Self {
        Self {
            tile_dir: tile_dir.as_ref().to_path_buf(),
            extension: extension.into(),
        }
    }

    /// Discover every tile in the directory and extract it
    pub fn build<S: FrameSource>(&self, source: &S) -> NdviResult<SeriesRun> {
        let paths = discover_tiles(&self.tile_dir, &self.extension)?;
        Ok(Self::build_from_paths(&paths, source))
    }

    /// Extract the given files; the input order is taken as file-name order
    pub fn build_from_paths<S: FrameSource>(paths: &[PathBuf], source: &S) -> SeriesRun {
        if paths.is_empty() {
            log::warn!("No input files, nothing to extract");
            return SeriesRun {
                status: ExtractionStatus::NoFiles,
                rows: Vec::new(),
                frames: Vec::new(),
                anchor_bounds: None,
                report: BatchReport::default(),
            };
        }

        #[cfg(feature = "parallel")]
        let results: Vec<_> = paths.par_iter().map(|p| extract_one(p, source)).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = paths.iter().map(|p| extract_one(p, source)).collect();

        let mut report = BatchReport::default();
        let mut anchor_bounds = None;
        let mut seen = HashSet::new();
        let mut collected: Vec<(SeriesRow, NdviImage)> = Vec::new();

        for (file, result) in results {
            let status = match result {
                Ok((tile, frame)) => {
                    if anchor_bounds.is_none() && frame.valid_fraction > 0.0 {
                        anchor_bounds = Some(frame.bounds);
                    }
                    accept(&tile, frame, &mut seen, &mut collected)
                }
                Err(err) => {
                    log::warn!("Skipping {}: {}", file, err);
                    TileStatus::Skipped {
                        reason: SkipReason::from_error(&err),
                    }
                }
            };
            report.outcomes.push(TileOutcome { file, status });
        }

        collected.sort_by_key(|(row, _)| (row.year, row.doy));
        let (rows, frames): (Vec<_>, Vec<_>) = collected.into_iter().unzip();

        let status = if rows.is_empty() {
            ExtractionStatus::NoValidData
        } else {
            ExtractionStatus::Ok
        };

        let run = SeriesRun {
            status,
            rows,
            frames,
            anchor_bounds,
            report,
        };
        log::info!("{}", run.message());
        run
    }
}

fn extract_one<S: FrameSource>(path: &Path, source: &S) -> (String, NdviResult<(RasterTile, ExtractedFrame)>) {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let result = tile_from_path(path).and_then(|tile| {
        let frame = source.extract(&tile)?;
        Ok((tile, frame))
    });
    (file, result)
}

fn accept(
    tile: &RasterTile,
    frame: ExtractedFrame,
    seen: &mut HashSet<(i32, u32)>,
    collected: &mut Vec<(SeriesRow, NdviImage)>,
) -> TileStatus {
    let row = match SeriesRow::from_frame(tile, &frame) {
        Ok(row) => row,
        Err(err) => {
            log::warn!("{}. Skipping.", err);
            return TileStatus::Skipped {
                reason: SkipReason::from_error(&err),
            };
        }
    };

    if !seen.insert((tile.year, tile.doy)) {
        log::warn!(
            "{} repeats acquisition {}-{:03}, keeping the earlier file",
            tile.file_name,
            tile.year,
            tile.doy
        );
        return TileStatus::Skipped {
            reason: SkipReason::DuplicateDate {
                year: tile.year,
                doy: tile.doy,
            },
        };
    }

    collected.push((row.clone(), frame.data));
    TileStatus::Processed { row }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, LatLon};
    use ndarray::Array2;
    use std::collections::HashMap;

    /// Serves canned frame values keyed by file name; `None` means no NDVI band
    struct Canned(HashMap<String, Option<f64>>);

    impl FrameSource for Canned {
        fn extract(&self, tile: &RasterTile) -> NdviResult<ExtractedFrame> {
            let value = match self.0.get(&tile.file_name) {
                Some(Some(v)) => *v,
                Some(None) => {
                    return Err(NdviError::BandNotFound {
                        file: tile.file_name.clone(),
                    })
                }
                None => return Err(NdviError::Processing("unknown file".to_string())),
            };
            Ok(ExtractedFrame {
                data: Array2::from_elem((2, 2), value),
                valid_fraction: if value.is_nan() { 0.0 } else { 1.0 },
                bounds: GeoBounds {
                    south_west: LatLon { lat: value, lon: 0.0 },
                    north_east: LatLon { lat: 1.0, lon: 1.0 },
                },
                geo_transform: GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, -1.0]),
            })
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/tiles/{}", n))).collect()
    }

    #[test]
    fn test_no_files() {
        let run = SeriesBuilder::build_from_paths(&[], &Canned(HashMap::new()));
        assert_eq!(run.status, ExtractionStatus::NoFiles);
    }

    #[test]
    fn test_rows_sorted_unique_and_skips_reported() {
        let canned: HashMap<String, Option<f64>> = [
            ("MOD13Q1.A2021001.h08v05.hdf", Some(0.3)),
            ("MOD13Q1.A2020017.h08v05.hdf", Some(0.2)),
            ("MOD13Q1.A2020001.h08v05.hdf", Some(f64::NAN)),
            ("MOD13Q1.A2020033.h08v05.hdf", None),
            ("MYD13Q1.A2020017.h08v05.hdf", Some(0.25)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let files = paths(&[
            "MOD13Q1.A2020001.h08v05.hdf",
            "MOD13Q1.A2020017.h08v05.hdf",
            "MOD13Q1.A2020033.h08v05.hdf",
            "MOD13Q1.A2021001.h08v05.hdf",
            "MYD13Q1.A2020017.h08v05.hdf",
            "readme.hdf",
        ]);
        let run = SeriesBuilder::build_from_paths(&files, &Canned(canned));

        assert_eq!(run.status, ExtractionStatus::Ok);
        let keys: Vec<_> = run.rows.iter().map(|r| (r.year, r.doy)).collect();
        assert_eq!(keys, vec![(2020, 17), (2021, 1)]);
        assert_eq!(run.frames.len(), 2);
        assert_eq!(run.report.outcomes.len(), 6);
        assert_eq!(run.report.processed_count(), 2);
        assert_eq!(run.report.all_masked_count(), 1);

        let reasons: Vec<_> = run
            .report
            .outcomes
            .iter()
            .filter_map(|o| match &o.status {
                TileStatus::Skipped { reason } => Some(reason.clone()),
                _ => None,
            })
            .collect();
        assert!(reasons.contains(&SkipReason::DuplicateDate { year: 2020, doy: 17 }));
        assert!(reasons.iter().any(|r| matches!(r, SkipReason::InvalidFileName { .. })));

        // First file with valid pixels anchors the map
        assert_eq!(run.anchor_bounds.unwrap().south_west.lat, 0.2);
    }

    /// Records the order in which tiles are extracted
    struct Recording(std::sync::Mutex<Vec<String>>);

    impl FrameSource for Recording {
        fn extract(&self, tile: &RasterTile) -> NdviResult<ExtractedFrame> {
            self.0.lock().unwrap().push(tile.file_name.clone());
            Canned(HashMap::from([(tile.file_name.clone(), Some(0.4))])).extract(tile)
        }
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn test_default_build_extracts_sequentially_in_name_order() {
        let names = [
            "MOD13Q1.A2020001.h08v05.hdf",
            "MOD13Q1.A2020017.h08v05.hdf",
            "MOD13Q1.A2020033.h08v05.hdf",
            "MOD13Q1.A2020049.h08v05.hdf",
        ];
        let source = Recording(std::sync::Mutex::new(Vec::new()));
        let run = SeriesBuilder::build_from_paths(&paths(&names), &source);

        assert_eq!(run.rows.len(), 4);
        assert_eq!(*source.0.lock().unwrap(), names.to_vec());
    }

    #[test]
    fn test_only_bad_name_is_no_valid_data() {
        let run = SeriesBuilder::build_from_paths(&paths(&["garbage.hdf"]), &Canned(HashMap::new()));
        assert_eq!(run.status, ExtractionStatus::NoValidData);
        assert!(run.rows.is_empty());
        assert_eq!(run.report.skipped_count(), 1);
    }
}
