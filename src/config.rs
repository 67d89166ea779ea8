//! Pipeline configuration
//!
//! Every tunable that used to be a process-wide constant lives here so each
//! component can be built and tested with its own values.

use crate::types::{GeoBounds, LatLon, NdviError, NdviResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Geographic area of interest, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl AreaOfInterest {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    /// The AOI itself as map bounds, used when no tile produced an anchor
    pub fn display_bounds(&self) -> GeoBounds {
        GeoBounds {
            south_west: LatLon { lat: self.south, lon: self.west },
            north_east: LatLon { lat: self.north, lon: self.east },
        }
    }
}

impl Default for AreaOfInterest {
    fn default() -> Self {
        Self::new(34.0, -119.5, 36.0, -117.5)
    }
}

/// Band selection, scaling and quality masking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Substring identifying the NDVI subdataset description
    pub ndvi_band_pattern: String,
    /// Quality band description substrings, highest priority first
    pub quality_band_patterns: Vec<String>,
    /// Multiplier from stored integers to physical NDVI
    pub ndvi_scale: f64,
    /// Raw fill value of the NDVI band
    pub nodata_raw: f64,
    /// Highest reliability code still considered usable
    pub quality_threshold: f64,
    /// Extra vertices inserted along each AOI edge before reprojection
    pub aoi_densify_points: usize,
}

impl MaskingConfig {
    pub fn scaled_nodata(&self) -> f64 {
        self.nodata_raw * self.ndvi_scale
    }
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            ndvi_band_pattern: "250m 16 days NDVI".to_string(),
            quality_band_patterns: vec!["pixel reliability".to_string(), "VI Quality".to_string()],
            ndvi_scale: 0.0001,
            nodata_raw: -3000.0,
            quality_threshold: 1.0,
            aoi_densify_points: 0,
        }
    }
}

/// Season detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhenologyConfig {
    /// Fraction of the seasonal amplitude above the minimum marking the season
    pub threshold_fraction: f64,
    /// Centered moving-average window, odd
    pub smoothing_window: usize,
}

impl PhenologyConfig {
    pub fn validate(&self) -> NdviResult<()> {
        if !(0.0..=1.0).contains(&self.threshold_fraction) {
            return Err(NdviError::Config(format!(
                "threshold_fraction must lie in [0, 1], got {}",
                self.threshold_fraction
            )));
        }
        if self.smoothing_window == 0 || self.smoothing_window % 2 == 0 {
            return Err(NdviError::Config(format!(
                "smoothing_window must be odd and positive, got {}",
                self.smoothing_window
            )));
        }
        Ok(())
    }
}

impl Default for PhenologyConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.4,
            smoothing_window: 3,
        }
    }
}

/// Frame and animation rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub vmin: f64,
    pub vmax: f64,
    /// Values below this are drawn transparent (water, bare ground)
    pub mask_below: f64,
    pub frame_delay_ms: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vmin: -0.2,
            vmax: 1.0,
            mask_below: -0.1,
            frame_delay_ms: 500,
        }
    }
}

/// Complete configuration of one extraction / analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tile_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Container file extension, matched case-insensitively
    pub tile_extension: String,
    pub area_of_interest: AreaOfInterest,
    pub masking: MaskingConfig,
    pub phenology: PhenologyConfig,
    pub render: RenderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_dir: PathBuf::from("data/tiles"),
            output_dir: PathBuf::from("static/results"),
            tile_extension: "hdf".to_string(),
            area_of_interest: AreaOfInterest::default(),
            masking: MaskingConfig::default(),
            phenology: PhenologyConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

pub const SUMMARY_FILE: &str = "ndvi_summary.csv";
pub const TIMESERIES_FILE: &str = "timeseries.json";
pub const ANIMATION_FILE: &str = "ndvi_animation.gif";

impl PipelineConfig {
    /// Load a JSON configuration; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> NdviResult<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NdviResult<()> {
        let aoi = &self.area_of_interest;
        if !(aoi.south < aoi.north) || !(aoi.west < aoi.east) {
            return Err(NdviError::Config(format!(
                "area of interest must satisfy south < north and west < east, got {:?}",
                aoi
            )));
        }
        if aoi.south < -90.0 || aoi.north > 90.0 || aoi.west < -180.0 || aoi.east > 180.0 {
            return Err(NdviError::Config(format!("area of interest outside valid degrees: {:?}", aoi)));
        }
        if !(self.masking.ndvi_scale > 0.0) {
            return Err(NdviError::Config(format!(
                "ndvi_scale must be positive, got {}",
                self.masking.ndvi_scale
            )));
        }
        self.phenology.validate()?;
        if self.masking.ndvi_band_pattern.is_empty() {
            return Err(NdviError::Config("ndvi_band_pattern must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }

    pub fn timeseries_path(&self) -> PathBuf {
        self.output_dir.join(TIMESERIES_FILE)
    }

    pub fn animation_path(&self) -> PathBuf {
        self.output_dir.join(ANIMATION_FILE)
    }
}
