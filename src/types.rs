use chrono::NaiveDate;
use ndarray::Array2;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

/// Physical NDVI values after scaling; NaN marks an invalid pixel
pub type NdviImage = Array2<f64>;

/// Raw band values exactly as stored in the container
pub type RawBand = Array2<f64>;

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// True when rows run along y and columns along x (no rotation terms)
    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0 && self.pixel_width != 0.0 && self.pixel_height != 0.0
    }

    /// World coordinate of the pixel corner at (col, row)
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Transform of a window starting at (col_off, row_off) of this grid
    pub fn shifted(&self, col_off: isize, row_off: isize) -> Self {
        let (x, y) = self.pixel_to_world(col_off as f64, row_off as f64);
        Self {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }
}

/// A geographic position, latitude first as map widgets expect it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl Serialize for LatLon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.lat)?;
        tup.serialize_element(&self.lon)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for LatLon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (lat, lon) = <(f64, f64)>::deserialize(deserializer)?;
        Ok(LatLon { lat, lon })
    }
}

/// South-west / north-east corner pair; serializes as `[[lat, lon], [lat, lon]]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

impl Serialize for GeoBounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.south_west)?;
        tup.serialize_element(&self.north_east)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for GeoBounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (south_west, north_east) = <(LatLon, LatLon)>::deserialize(deserializer)?;
        Ok(GeoBounds { south_west, north_east })
    }
}

/// One input container, identified by the acquisition date in its name
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    pub path: PathBuf,
    pub file_name: String,
    pub year: i32,
    pub doy: u32,
    pub date: NaiveDate,
}

impl RasterTile {
    pub fn date_iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// A single subdataset read from a container, in its native CRS
#[derive(Debug, Clone)]
pub struct NativeRaster {
    pub data: RawBand,
    pub geo_transform: GeoTransform,
    /// WKT of the native coordinate reference system
    pub projection: String,
}

/// In-memory result of extracting one tile
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub data: NdviImage,
    pub valid_fraction: f64,
    pub bounds: GeoBounds,
    pub geo_transform: GeoTransform,
}

impl ExtractedFrame {
    /// Mean over finite pixels, `None` when every pixel is masked
    pub fn mean_ndvi(&self) -> Option<f64> {
        crate::core::stats::nan_mean(self.data.iter().copied())
    }
}

/// One row of the canonical summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub file: String,
    pub year: i32,
    pub doy: u32,
    pub date_iso: String,
    pub mean_ndvi: f64,
    pub valid_fraction: f64,
}

impl SeriesRow {
    /// Summarise a frame; fails with `AllMasked` when no pixel is valid
    pub fn from_frame(tile: &RasterTile, frame: &ExtractedFrame) -> NdviResult<Self> {
        let mean_ndvi = frame.mean_ndvi().ok_or_else(|| NdviError::AllMasked {
            file: tile.file_name.clone(),
        })?;
        Ok(Self {
            file: tile.file_name.clone(),
            year: tile.year,
            doy: tile.doy,
            date_iso: tile.date_iso(),
            mean_ndvi,
            valid_fraction: frame.valid_fraction,
        })
    }

    /// Calendar date from (year, doy), independent of the stored ISO string
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_yo_opt(self.year, self.doy)
    }
}

/// Error types for NDVI processing
#[derive(Debug, thiserror::Error)]
pub enum NdviError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{} not found. Run the extraction step first.", .path.display())]
    InputMissing { path: PathBuf },

    #[error("NDVI subdataset not found in {file}")]
    BandNotFound { file: String },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("All pixels masked out for {file}")]
    AllMasked { file: String },

    #[error("Invalid tile file name '{0}': expected a token like A2020001")]
    InvalidFileName(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for NDVI operations
pub type NdviResult<T> = Result<T, NdviError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_serialize_leaflet_order() {
        let bounds = GeoBounds {
            south_west: LatLon { lat: 34.0, lon: -119.5 },
            north_east: LatLon { lat: 36.0, lon: -117.5 },
        };
        let json = serde_json::to_string(&bounds).unwrap();
        assert_eq!(json, "[[34.0,-119.5],[36.0,-117.5]]");
    }

    #[test]
    fn test_bounds_read_back_from_tuples() {
        let bounds = GeoBounds {
            south_west: LatLon { lat: 34.0, lon: -119.5 },
            north_east: LatLon { lat: 36.0, lon: -117.5 },
        };
        let json = serde_json::to_string(&bounds).unwrap();
        let parsed: GeoBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bounds);

        let point: LatLon = serde_json::from_str("[35.1, -118.2]").unwrap();
        assert_eq!(point, LatLon { lat: 35.1, lon: -118.2 });
    }

    #[test]
    fn test_geo_transform_window_shift() {
        let gt = GeoTransform::from_gdal([1000.0, 250.0, 0.0, 5000.0, 0.0, -250.0]);
        let shifted = gt.shifted(2, 3);
        assert_eq!(shifted.top_left_x, 1500.0);
        assert_eq!(shifted.top_left_y, 4250.0);
        assert_eq!(shifted.pixel_width, 250.0);
        assert!(shifted.is_north_up());
    }
}
