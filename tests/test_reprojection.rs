use approx::assert_abs_diff_eq;
use gdal::spatial_ref::SpatialRef;
use ndarray::Array2;
use ndvi_phenology::config::{AreaOfInterest, MaskingConfig};
use ndvi_phenology::core::reproject::{aoi_polygon, CrsTransform, GdalCrsTransform};
use ndvi_phenology::core::TileExtractor;
use ndvi_phenology::types::{GeoTransform, NativeRaster};
use geo::BoundingRect;

/// MODIS sinusoidal grid on the authalic sphere
const MODIS_SINUSOIDAL: &str = "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs";

fn sinusoidal_wkt() -> String {
    SpatialRef::from_proj4(MODIS_SINUSOIDAL)
        .and_then(|srs| srs.to_wkt())
        .expect("Failed to build sinusoidal CRS")
}

#[test]
fn test_sinusoidal_round_trip() {
    let wkt = sinusoidal_wkt();
    let to_native = GdalCrsTransform::geographic_to(&wkt).expect("forward transform");
    let to_geographic = GdalCrsTransform::to_geographic(&wkt).expect("inverse transform");

    for (lon, lat) in [(-119.5, 34.0), (-117.5, 34.0), (-117.5, 36.0), (-119.5, 36.0)] {
        let (x, y) = to_native.project_point(lon, lat).unwrap();
        let (back_lon, back_lat) = to_geographic.project_point(x, y).unwrap();
        assert_abs_diff_eq!(back_lon, lon, epsilon = 1e-6);
        assert_abs_diff_eq!(back_lat, lat, epsilon = 1e-6);
    }
}

#[test]
fn test_sinusoidal_axis_order() {
    let to_native = GdalCrsTransform::geographic_to(&sinusoidal_wkt()).unwrap();

    // x is easting from longitude, y is northing from latitude
    let (x, y) = to_native.project_point(1.0, 0.0).unwrap();
    assert_abs_diff_eq!(x, 6371007.181 * 1f64.to_radians(), epsilon = 1e-3);
    assert_abs_diff_eq!(y, 0.0, epsilon = 1e-3);

    let (x, y) = to_native.project_point(0.0, 1.0).unwrap();
    assert_abs_diff_eq!(x, 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(y, 6371007.181 * 1f64.to_radians(), epsilon = 1e-3);
}

#[test]
fn test_sinusoidal_extraction_masks_outside_aoi() {
    let wkt = sinusoidal_wkt();
    let to_native = GdalCrsTransform::geographic_to(&wkt).unwrap();
    let to_geographic = GdalCrsTransform::to_geographic(&wkt).unwrap();

    let aoi = AreaOfInterest::default();
    let native = to_native.project_polygon(&aoi_polygon(&aoi, 0)).unwrap();
    let bbox = native.bounding_rect().unwrap();

    // 1 km grid with a 5 km margin around the AOI footprint
    let pixel = 1000.0;
    let origin_x = (bbox.min().x / pixel).floor() * pixel - 5.0 * pixel;
    let origin_y = (bbox.max().y / pixel).ceil() * pixel + 5.0 * pixel;
    let cols = ((bbox.max().x - origin_x) / pixel).ceil() as usize + 5;
    let rows = ((origin_y - bbox.min().y) / pixel).ceil() as usize + 5;

    let raster = NativeRaster {
        data: Array2::from_elem((rows, cols), 6000.0),
        geo_transform: GeoTransform::from_gdal([origin_x, pixel, 0.0, origin_y, 0.0, -pixel]),
        projection: wkt.clone(),
    };

    let extractor = TileExtractor::new(aoi, MaskingConfig::default());
    let frame = extractor
        .extract_raster(&raster, None, &to_native, &to_geographic)
        .expect("extraction failed");

    let (h, w) = frame.data.dim();
    assert!(h < rows && w < cols, "frame was not cropped");

    // The west edge leans east going north, so the north-west cell is off the AOI
    assert!(frame.data[[0, 0]].is_nan());
    assert!(frame.data[[h - 1, 0]].is_finite());
    // Sheared footprint covers well under the full window
    assert!(frame.valid_fraction > 0.3 && frame.valid_fraction < 0.6);
    assert_abs_diff_eq!(frame.mean_ndvi().unwrap(), 0.6, epsilon = 1e-12);

    assert_abs_diff_eq!(frame.bounds.south_west.lat, 34.0, epsilon = 0.02);
    assert_abs_diff_eq!(frame.bounds.north_east.lat, 36.0, epsilon = 0.02);
    assert!(frame.bounds.south_west.lon < frame.bounds.north_east.lon);
}
