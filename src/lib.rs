//! ndvi-phenology: MODIS NDVI tile extraction, phenology and peak-date forecast
//!
//! Reads vegetation-index tiles, resolves the NDVI and quality bands, masks
//! unreliable pixels, clips every tile to a geographic area of interest in
//! the tile's native projection and reduces it to one mean per acquisition.
//! The resulting series drives the season markers and the trend forecast.

pub mod types;
pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    ExtractedFrame, GeoBounds, GeoTransform, LatLon, NdviError, NdviImage, NdviResult, RasterTile, SeriesRow,
};
pub use config::{AreaOfInterest, MaskingConfig, PhenologyConfig, PipelineConfig, RenderConfig};
pub use core::{ExtractionStatus, ForecastResult, PhenologyResult, TileExtractor};
pub use pipeline::{compute_forecast, compute_phenology, extract_all, load_report, load_summary, ExtractionSummary};
