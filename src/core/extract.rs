use crate::config::{AreaOfInterest, MaskingConfig, PipelineConfig};
use crate::core::band_resolver::BandResolver;
use crate::core::clip::clip_to_polygon;
use crate::core::quality_mask::{scale_and_mask, unify_nodata};
use crate::core::reproject::{geographic_bounds, reproject_aoi, CrsTransform, GdalCrsTransform};
use crate::core::stats::valid_fraction;
use crate::io::hdf_reader::HdfContainer;
use crate::types::{ExtractedFrame, NativeRaster, NdviError, NdviResult, RasterTile, RawBand};
use geo::Polygon;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Anything that can turn a tile into a clipped frame
pub trait FrameSource: Sync {
    fn extract(&self, tile: &RasterTile) -> NdviResult<ExtractedFrame>;
}

/// Per-file pipeline: bands → scale/mask → AOI → clip → bounds → valid fraction
pub struct TileExtractor {
    aoi: AreaOfInterest,
    masking: MaskingConfig,
    resolver: BandResolver,
    /// Native-CRS AOI keyed by projection WKT
    aoi_cache: Mutex<HashMap<String, Polygon<f64>>>,
}

impl TileExtractor {
    pub fn new(aoi: AreaOfInterest, masking: MaskingConfig) -> Self {
        let resolver = BandResolver::from_config(&masking);
        Self {
            aoi,
            masking,
            resolver,
            aoi_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.area_of_interest, config.masking.clone())
    }

    /// Extract one container from disk
    pub fn extract_file(&self, path: &Path) -> NdviResult<ExtractedFrame> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("Extracting NDVI from: {}", file);

        let container = HdfContainer::open(path)?;
        let bands = self.resolver.resolve(container.subdatasets(), &file)?;

        let ndvi = container.read_subdataset(&bands.ndvi)?;
        let quality = match &bands.quality {
            Some(sds) => Some(container.read_subdataset(sds)?.data),
            None => None,
        };

        let to_native = GdalCrsTransform::geographic_to(&ndvi.projection)?;
        let to_geographic = GdalCrsTransform::to_geographic(&ndvi.projection)?;
        self.extract_raster(&ndvi, quality.as_ref(), &to_native, &to_geographic)
    }

    /// Extraction on an already-read raster with caller-supplied transforms
    ///
    /// The returned frame may be entirely NaN (AOI outside the footprint or
    /// everything masked); deciding what to do with it is up to the caller.
    pub fn extract_raster(
        &self,
        raster: &NativeRaster,
        quality: Option<&RawBand>,
        to_native: &dyn CrsTransform,
        to_geographic: &dyn CrsTransform,
    ) -> NdviResult<ExtractedFrame> {
        let ndvi = scale_and_mask(&raster.data, quality, &self.masking)?;
        let native_aoi = self.native_aoi(&raster.projection, to_native)?;

        let clipped = clip_to_polygon(&ndvi, &raster.geo_transform, &native_aoi)?;
        let mut data = clipped.data;
        let fill = unify_nodata(&mut data, self.masking.scaled_nodata());
        if fill > 0 {
            log::debug!("Replaced {} fill pixels with NaN", fill);
        }

        let bounds = geographic_bounds(data.dim(), &clipped.geo_transform, to_geographic)?;
        let valid_fraction = valid_fraction(data.iter().copied());
        log::debug!(
            "Clipped frame {:?}, valid fraction {:.4}, bounds {:?}",
            data.dim(),
            valid_fraction,
            bounds
        );

        Ok(ExtractedFrame {
            data,
            valid_fraction,
            bounds,
            geo_transform: clipped.geo_transform,
        })
    }

    fn native_aoi(&self, projection: &str, to_native: &dyn CrsTransform) -> NdviResult<Polygon<f64>> {
        let mut cache = self
            .aoi_cache
            .lock()
            .map_err(|_| NdviError::Processing("AOI cache lock poisoned".to_string()))?;

        if let Some(polygon) = cache.get(projection) {
            return Ok(polygon.clone());
        }

        let polygon = reproject_aoi(&self.aoi, self.masking.aoi_densify_points, to_native)?;
        cache.insert(projection.to_string(), polygon.clone());
        Ok(polygon)
    }

    /// Number of distinct native CRSs seen so far
    pub fn cached_crs_count(&self) -> usize {
        self.aoi_cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl FrameSource for TileExtractor {
    fn extract(&self, tile: &RasterTile) -> NdviResult<ExtractedFrame> {
        self.extract_file(&tile.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use ndarray::Array2;

    /// Degrees scaled to "metres" so the native grid is a plain plate carrée
    struct Scale(f64);

    impl CrsTransform for Scale {
        fn project_point(&self, x: f64, y: f64) -> NdviResult<(f64, f64)> {
            Ok((x * self.0, y * self.0))
        }
    }

    fn raster(raw: f64) -> NativeRaster {
        // 20 x 20 grid of 0.1 degree pixels covering lon 0..2, lat 0..2, scaled by 1000
        NativeRaster {
            data: Array2::from_elem((20, 20), raw),
            geo_transform: GeoTransform::from_gdal([0.0, 100.0, 0.0, 2000.0, 0.0, -100.0]),
            projection: "LOCAL_CS[\"scaled\"]".to_string(),
        }
    }

    fn extractor(aoi: AreaOfInterest) -> TileExtractor {
        TileExtractor::new(aoi, MaskingConfig::default())
    }

    #[test]
    fn test_extract_inside_aoi() {
        let ex = extractor(AreaOfInterest::new(0.5, 0.5, 1.0, 1.5));
        let frame = ex
            .extract_raster(&raster(5000.0), None, &Scale(1000.0), &Scale(0.001))
            .unwrap();

        assert_eq!(frame.data.dim(), (5, 10));
        assert!(frame.data.iter().all(|v| (*v - 0.5).abs() < 1e-12));
        assert_eq!(frame.valid_fraction, 1.0);
        assert!((frame.bounds.south_west.lat - 0.5).abs() < 1e-9);
        assert!((frame.bounds.south_west.lon - 0.5).abs() < 1e-9);
        assert!((frame.bounds.north_east.lat - 1.0).abs() < 1e-9);
        assert!((frame.bounds.north_east.lon - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_fill_and_quality_become_nan() {
        let ex = extractor(AreaOfInterest::new(0.0, 0.0, 2.0, 2.0));
        let mut r = raster(4000.0);
        r.data[[0, 0]] = -3000.0;
        let mut quality = Array2::zeros((20, 20));
        quality[[1, 1]] = 3.0;

        let frame = ex
            .extract_raster(&r, Some(&quality), &Scale(1000.0), &Scale(0.001))
            .unwrap();
        assert!(frame.data[[0, 0]].is_nan());
        assert!(frame.data[[1, 1]].is_nan());
        assert_eq!(frame.data.iter().filter(|v| v.is_finite()).count(), 398);
        assert!((frame.valid_fraction - 398.0 / 400.0).abs() < 1e-12);
    }

    #[test]
    fn test_aoi_outside_footprint_all_nan() {
        let ex = extractor(AreaOfInterest::new(40.0, 40.0, 41.0, 41.0));
        let frame = ex
            .extract_raster(&raster(5000.0), None, &Scale(1000.0), &Scale(0.001))
            .unwrap();
        assert!(frame.data.iter().all(|v| v.is_nan()));
        assert_eq!(frame.valid_fraction, 0.0);
        assert!(frame.mean_ndvi().is_none());
    }

    /// Lat-dependent shift of x, so the AOI becomes a parallelogram natively
    struct Shear;

    impl CrsTransform for Shear {
        fn project_point(&self, lon: f64, lat: f64) -> NdviResult<(f64, f64)> {
            Ok((lon * 1000.0 + lat * 500.0, lat * 1000.0))
        }
    }

    struct Unshear;

    impl CrsTransform for Unshear {
        fn project_point(&self, x: f64, y: f64) -> NdviResult<(f64, f64)> {
            Ok(((x - 0.5 * y) / 1000.0, y / 1000.0))
        }
    }

    #[test]
    fn test_nan_exactly_outside_sheared_aoi_or_failed_quality() {
        // 20 x 30 grid of 100 unit pixels, origin (0, 2000)
        let (rows, cols) = (20, 30);
        let raster = NativeRaster {
            data: Array2::from_shape_fn((rows, cols), |(r, c)| 1000.0 + 10.0 * c as f64 + r as f64),
            geo_transform: GeoTransform::from_gdal([0.0, 100.0, 0.0, 2000.0, 0.0, -100.0]),
            projection: "LOCAL_CS[\"sheared\"]".to_string(),
        };
        let quality = Array2::from_shape_fn((rows, cols), |(r, c)| ((7 * r + 3 * c) % 4) as f64);

        let ex = extractor(AreaOfInterest::new(0.5, 0.5, 1.5, 1.5));
        let frame = ex
            .extract_raster(&raster, Some(&quality), &Shear, &Unshear)
            .unwrap();

        let gt = frame.geo_transform;
        let col_off = (gt.top_left_x / 100.0).round() as usize;
        let row_off = ((2000.0 - gt.top_left_y) / 100.0).round() as usize;
        assert_eq!((row_off, col_off), (5, 7));
        assert_eq!(frame.data.dim(), (10, 16));

        // Native AOI: y in [500, 1500], x in [500 + y / 2, 1500 + y / 2]
        let touches = |r: usize, c: usize| {
            let x0 = c as f64 * 100.0;
            let x1 = x0 + 100.0;
            let y_top = 2000.0 - r as f64 * 100.0;
            let lo = (y_top - 100.0).max(500.0);
            let hi = y_top.min(1500.0);
            lo <= hi && 2.0 * (x0 - 1500.0) <= hi && lo <= 2.0 * (x1 - 500.0)
        };

        let (mut outside, mut rejected) = (0, 0);
        for ((i, j), value) in frame.data.indexed_iter() {
            let (r, c) = (i + row_off, j + col_off);
            let inside = touches(r, c);
            let reliable = quality[[r, c]] <= 1.0;
            outside += usize::from(!inside);
            rejected += usize::from(inside && !reliable);

            if inside && reliable {
                assert!(
                    (value - raster.data[[r, c]] * 0.0001).abs() < 1e-12,
                    "pixel ({}, {}) should hold its scaled value, got {}",
                    r,
                    c,
                    value
                );
            } else {
                assert!(value.is_nan(), "pixel ({}, {}) should be masked, got {}", r, c, value);
            }
        }
        assert!(outside > 0 && rejected > 0);
    }

    #[test]
    fn test_aoi_cached_per_crs() {
        let ex = extractor(AreaOfInterest::new(0.5, 0.5, 1.0, 1.5));
        for _ in 0..3 {
            ex.extract_raster(&raster(5000.0), None, &Scale(1000.0), &Scale(0.001))
                .unwrap();
        }
        assert_eq!(ex.cached_crs_count(), 1);
    }
}
