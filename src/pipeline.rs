//! Entry points shared by the CLI, the Python module and any presentation layer

use crate::config::{PhenologyConfig, PipelineConfig};
use crate::core::extract::TileExtractor;
use crate::core::forecast::{ForecastResult, TrendForecaster};
use crate::core::phenology::{PhenologyAnalyzer, PhenologyResult};
use crate::core::series::{BatchReport, ExtractionStatus, SeriesBuilder, SeriesRun};
use crate::io::artifacts::{clear_rendered, list_frames, read_summary_csv, write_summary_csv, write_timeseries_json};
use crate::io::render::{write_animation, write_frames, ColormapRenderer, FrameRenderer};
use crate::types::{GeoBounds, NdviResult, SeriesRow};
use serde::Serialize;
use std::path::Path;

/// What an extraction run produced and where the map should look
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub status: ExtractionStatus,
    pub message: String,
    pub rows: Vec<SeriesRow>,
    /// Rendered frame file names, in row order
    pub frames: Vec<String>,
    pub anchor_bounds: Option<GeoBounds>,
    /// Anchor bounds, or the AOI itself when no tile had valid pixels
    pub display_bounds: GeoBounds,
    pub report: BatchReport,
}

/// Run extraction over the configured tile directory and persist the artifacts
///
/// Artifacts are only written when at least one row was produced; a run with
/// no files or no valid data leaves the output directory untouched.
pub fn extract_all(config: &PipelineConfig) -> NdviResult<ExtractionSummary> {
    config.validate()?;
    log::info!(
        "Extracting NDVI from {} into {}",
        config.tile_dir.display(),
        config.output_dir.display()
    );

    let extractor = TileExtractor::from_config(config);
    let run = SeriesBuilder::new(&config.tile_dir, config.tile_extension.as_str()).build(&extractor)?;

    let frames = if run.status == ExtractionStatus::Ok {
        persist(config, &run)?
    } else {
        log::warn!("{}", run.message());
        Vec::new()
    };

    let display_bounds = run
        .anchor_bounds
        .unwrap_or_else(|| config.area_of_interest.display_bounds());

    Ok(ExtractionSummary {
        message: run.message(),
        status: run.status,
        rows: run.rows,
        frames,
        anchor_bounds: run.anchor_bounds,
        display_bounds,
        report: run.report,
    })
}

/// Replace every artifact of the previous run with this run's
fn persist(config: &PipelineConfig, run: &SeriesRun) -> NdviResult<Vec<String>> {
    std::fs::create_dir_all(&config.output_dir)?;
    clear_rendered(&config.output_dir)?;
    write_summary_csv(&config.summary_path(), &run.rows)?;
    write_timeseries_json(&config.timeseries_path(), &run.rows)?;

    if !config.render.enabled {
        return Ok(Vec::new());
    }

    let renderer = ColormapRenderer::new(config.render);
    render_run(&renderer, config, run)
}

fn render_run(renderer: &dyn FrameRenderer, config: &PipelineConfig, run: &SeriesRun) -> NdviResult<Vec<String>> {
    let (names, images) = write_frames(renderer, &config.output_dir, &run.rows, &run.frames)?;
    write_animation(&config.animation_path(), &images, config.render.frame_delay_ms)?;
    Ok(names)
}

/// Season markers for `rows`; rejects an even or zero smoothing window
pub fn compute_phenology(rows: &[SeriesRow], config: &PhenologyConfig) -> NdviResult<PhenologyResult> {
    config.validate()?;
    Ok(PhenologyAnalyzer::new(*config).analyze(rows))
}

pub fn compute_forecast(rows: &[SeriesRow]) -> ForecastResult {
    TrendForecaster::forecast(rows)
}

/// Load a previously written summary table
///
/// Fails with `InputMissing` when extraction has not been run yet.
pub fn load_summary(path: &Path) -> NdviResult<Vec<SeriesRow>> {
    read_summary_csv(path)
}

/// Everything a viewer needs from a finished run, read back from disk
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rows: usize,
    pub phenology: PhenologyResult,
    pub forecast: ForecastResult,
    pub frames: Vec<String>,
}

pub fn load_report(config: &PipelineConfig) -> NdviResult<RunReport> {
    let rows = load_summary(&config.summary_path())?;
    Ok(RunReport {
        rows: rows.len(),
        phenology: compute_phenology(&rows, &config.phenology)?,
        forecast: compute_forecast(&rows),
        frames: list_frames(&config.output_dir)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NdviError;
    use ndarray::Array2;

    fn run_for(dates: &[(i32, u32)]) -> SeriesRun {
        let rows: Vec<SeriesRow> = dates
            .iter()
            .map(|&(year, doy)| SeriesRow {
                file: format!("MOD13Q1.A{}{:03}.h08v05.hdf", year, doy),
                year,
                doy,
                date_iso: chrono::NaiveDate::from_yo_opt(year, doy).unwrap().to_string(),
                mean_ndvi: 0.5,
                valid_fraction: 1.0,
            })
            .collect();
        let frames = rows.iter().map(|_| Array2::from_elem((2, 2), 0.5)).collect();
        SeriesRun {
            status: ExtractionStatus::Ok,
            rows,
            frames,
            anchor_bounds: None,
            report: BatchReport::default(),
        }
    }

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            tile_dir: dir.join("tiles"),
            output_dir: dir.join("results"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_empty_tile_dir_is_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(&config.tile_dir).unwrap();

        let summary = extract_all(&config).unwrap();
        assert_eq!(summary.status, ExtractionStatus::NoFiles);
        assert!(summary.rows.is_empty());
        assert!(summary.anchor_bounds.is_none());
        assert_eq!(summary.display_bounds, config.area_of_interest.display_bounds());
        assert!(!config.summary_path().exists());
    }

    #[test]
    fn test_bad_file_name_only_is_no_valid_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(&config.tile_dir).unwrap();
        std::fs::write(config.tile_dir.join("not_a_tile.hdf"), b"junk").unwrap();

        let summary = extract_all(&config).unwrap();
        assert_eq!(summary.status, ExtractionStatus::NoValidData);
        assert_eq!(summary.report.skipped_count(), 1);
    }

    #[test]
    fn test_rerun_replaces_previous_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let first = persist(&config, &run_for(&[(2020, 1), (2020, 17), (2020, 33)])).unwrap();
        assert_eq!(first.len(), 3);

        let second = persist(&config, &run_for(&[(2021, 1), (2021, 17)])).unwrap();
        assert_eq!(second, vec!["frame_2021-01-01.png", "frame_2021-01-17.png"]);
        assert_eq!(list_frames(&config.output_dir).unwrap(), second);
        assert!(config.animation_path().exists());

        let report = load_report(&config).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.frames, second);
    }

    #[test]
    fn test_rerun_without_rendering_drops_old_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        persist(&config, &run_for(&[(2020, 1)])).unwrap();

        config.render.enabled = false;
        assert!(persist(&config, &run_for(&[(2021, 1)])).unwrap().is_empty());
        assert!(list_frames(&config.output_dir).unwrap().is_empty());
        assert!(!config.animation_path().exists());
    }

    #[test]
    fn test_phenology_rejects_even_window() {
        let rows = run_for(&[(2020, 1), (2020, 17), (2020, 33), (2020, 49), (2020, 65)]).rows;
        let config = PhenologyConfig {
            smoothing_window: 4,
            ..PhenologyConfig::default()
        };
        assert!(matches!(compute_phenology(&rows, &config), Err(NdviError::Config(_))));
        assert!(compute_phenology(&rows, &PhenologyConfig::default()).is_ok());
    }

    #[test]
    fn test_report_requires_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(matches!(load_report(&config), Err(NdviError::InputMissing { .. })));
    }
}
