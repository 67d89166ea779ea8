use crate::types::{GeoTransform, NdviError, NdviImage, NdviResult};
use geo::{BoundingRect, Coord, Intersects, Polygon, Rect};
use ndarray::{s, Array2};

/// Tolerance in pixels when snapping the polygon window to the grid
const WINDOW_EPSILON: f64 = 1e-6;

/// A raster cropped to a polygon's extent
#[derive(Debug, Clone)]
pub struct ClippedRaster {
    pub data: NdviImage,
    pub geo_transform: GeoTransform,
    /// False when the polygon lies entirely outside the source raster
    pub overlaps: bool,
}

/// Pixel window `[row_start, row_stop) x [col_start, col_stop)`, possibly outside the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_start: isize,
    pub row_stop: isize,
    pub col_start: isize,
    pub col_stop: isize,
}

impl PixelWindow {
    pub fn height(&self) -> usize {
        (self.row_stop - self.row_start).max(0) as usize
    }

    pub fn width(&self) -> usize {
        (self.col_stop - self.col_start).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Intersection with a `rows x cols` grid
    pub fn clamp_to(&self, rows: usize, cols: usize) -> Self {
        Self {
            row_start: self.row_start.clamp(0, rows as isize),
            row_stop: self.row_stop.clamp(0, rows as isize),
            col_start: self.col_start.clamp(0, cols as isize),
            col_stop: self.col_stop.clamp(0, cols as isize),
        }
    }
}

/// Smallest pixel window covering the polygon's bounding box
pub fn polygon_window(polygon: &Polygon<f64>, geo_transform: &GeoTransform) -> NdviResult<PixelWindow> {
    if !geo_transform.is_north_up() {
        return Err(NdviError::Geometry(format!(
            "rotated or degenerate geotransform is not supported: {:?}",
            geo_transform.to_gdal()
        )));
    }

    let bbox = polygon
        .bounding_rect()
        .ok_or_else(|| NdviError::Geometry("area of interest polygon is empty".to_string()))?;

    let to_col = |x: f64| (x - geo_transform.top_left_x) / geo_transform.pixel_width;
    let to_row = |y: f64| (y - geo_transform.top_left_y) / geo_transform.pixel_height;

    let (c0, c1) = (to_col(bbox.min().x), to_col(bbox.max().x));
    let (r0, r1) = (to_row(bbox.min().y), to_row(bbox.max().y));

    let window = PixelWindow {
        row_start: (r0.min(r1) + WINDOW_EPSILON).floor() as isize,
        row_stop: (r0.max(r1) - WINDOW_EPSILON).ceil() as isize,
        col_start: (c0.min(c1) + WINDOW_EPSILON).floor() as isize,
        col_stop: (c0.max(c1) - WINDOW_EPSILON).ceil() as isize,
    };
    Ok(window)
}

/// Crop `data` to the polygon's window and blank pixels the polygon does not touch
///
/// A pixel is kept when any part of its cell touches the polygon. If the
/// polygon misses the raster entirely the result is an all-NaN array covering
/// the polygon's window.
pub fn clip_to_polygon(
    data: &NdviImage,
    geo_transform: &GeoTransform,
    polygon: &Polygon<f64>,
) -> NdviResult<ClippedRaster> {
    let (rows, cols) = data.dim();
    let window = polygon_window(polygon, geo_transform)?;
    let clamped = window.clamp_to(rows, cols);

    if clamped.is_empty() {
        log::debug!("Polygon window {:?} does not overlap {}x{} raster", window, rows, cols);
        let shape = (window.height().max(1), window.width().max(1));
        return Ok(ClippedRaster {
            data: Array2::from_elem(shape, f64::NAN),
            geo_transform: geo_transform.shifted(window.col_start, window.row_start),
            overlaps: false,
        });
    }

    let clipped_transform = geo_transform.shifted(clamped.col_start, clamped.row_start);
    let mut clipped = data
        .slice(s![
            clamped.row_start..clamped.row_stop,
            clamped.col_start..clamped.col_stop
        ])
        .to_owned();

    let mut outside = 0usize;
    for ((row, col), value) in clipped.indexed_iter_mut() {
        if !pixel_touches(&clipped_transform, row, col, polygon) {
            *value = f64::NAN;
            outside += 1;
        }
    }

    log::debug!(
        "Clipped to {}x{} window at ({}, {}); {} pixels outside polygon",
        clamped.height(),
        clamped.width(),
        clamped.row_start,
        clamped.col_start,
        outside
    );

    Ok(ClippedRaster {
        data: clipped,
        geo_transform: clipped_transform,
        overlaps: true,
    })
}

fn pixel_touches(geo_transform: &GeoTransform, row: usize, col: usize, polygon: &Polygon<f64>) -> bool {
    let (x0, y0) = geo_transform.pixel_to_world(col as f64, row as f64);
    let (x1, y1) = geo_transform.pixel_to_world(col as f64 + 1.0, row as f64 + 1.0);
    let cell = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
    cell.intersects(polygon)
}
