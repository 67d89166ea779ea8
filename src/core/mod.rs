//! Core NDVI processing modules

pub mod stats;
pub mod band_resolver;
pub mod quality_mask;
pub mod reproject;
pub mod clip;
pub mod extract;
pub mod series;
pub mod phenology;
pub mod forecast;

// Re-export main types
pub use band_resolver::{BandResolver, ResolvedBands, Subdataset};
pub use quality_mask::{scale_and_mask, unify_nodata};
pub use reproject::{aoi_polygon, geographic_bounds, reproject_aoi, CrsTransform, GdalCrsTransform};
pub use clip::{clip_to_polygon, ClippedRaster, PixelWindow};
pub use extract::{FrameSource, TileExtractor};
pub use series::{BatchReport, ExtractionStatus, SeriesBuilder, SeriesRun, SkipReason, TileOutcome, TileStatus};
pub use phenology::{PhenologyAnalyzer, PhenologyPoint, PhenologyResult};
pub use forecast::{ForecastResult, TrendForecaster, YearPeak};
