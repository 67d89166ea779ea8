//! Coordinate reference system transforms for the AOI and the clipped extent
//!
//! Both directions go through a full CRS transform with traditional GIS axis
//! order on either side (x = longitude / easting, y = latitude / northing).

use crate::config::AreaOfInterest;
use crate::types::{GeoBounds, GeoTransform, LatLon, NdviError, NdviResult};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use geo::{Coord, LineString, Polygon};

/// EPSG code of geographic WGS84
pub const WGS84_EPSG: u32 = 4326;

/// A point-wise mapping between two coordinate reference systems
pub trait CrsTransform {
    fn project_point(&self, x: f64, y: f64) -> NdviResult<(f64, f64)>;

    /// Project every vertex of the exterior ring
    fn project_polygon(&self, polygon: &Polygon<f64>) -> NdviResult<Polygon<f64>> {
        let coords = polygon
            .exterior()
            .coords()
            .map(|c| self.project_point(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .collect::<NdviResult<Vec<_>>>()?;
        Ok(Polygon::new(LineString::from(coords), vec![]))
    }
}

/// GDAL/OSR-backed transform
pub struct GdalCrsTransform {
    transform: CoordTransform,
}

impl GdalCrsTransform {
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> NdviResult<Self> {
        let transform = CoordTransform::new(source, target)
            .map_err(|e| NdviError::Geometry(format!("cannot build coordinate transform: {}", e)))?;
        Ok(Self { transform })
    }

    /// Geographic WGS84 (lon, lat) into the CRS described by `wkt`
    pub fn geographic_to(wkt: &str) -> NdviResult<Self> {
        let source = traditional_order(SpatialRef::from_epsg(WGS84_EPSG))?;
        let target = traditional_order(SpatialRef::from_wkt(wkt))?;
        Self::new(&source, &target)
    }

    /// The CRS described by `wkt` into geographic WGS84 (lon, lat)
    pub fn to_geographic(wkt: &str) -> NdviResult<Self> {
        let source = traditional_order(SpatialRef::from_wkt(wkt))?;
        let target = traditional_order(SpatialRef::from_epsg(WGS84_EPSG))?;
        Self::new(&source, &target)
    }

    fn transform_all(&self, xs: &mut [f64], ys: &mut [f64]) -> NdviResult<()> {
        let mut zs = vec![0.0; xs.len()];
        self.transform
            .transform_coords(xs, ys, &mut zs)
            .map_err(|e| NdviError::Geometry(format!("coordinate transform failed: {}", e)))?;

        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(NdviError::Geometry(
                "coordinate transform produced non-finite coordinates".to_string(),
            ));
        }
        Ok(())
    }
}

impl CrsTransform for GdalCrsTransform {
    fn project_point(&self, x: f64, y: f64) -> NdviResult<(f64, f64)> {
        let mut xs = [x];
        let mut ys = [y];
        self.transform_all(&mut xs, &mut ys)?;
        Ok((xs[0], ys[0]))
    }

    fn project_polygon(&self, polygon: &Polygon<f64>) -> NdviResult<Polygon<f64>> {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) =
            polygon.exterior().coords().map(|c| (c.x, c.y)).unzip();
        self.transform_all(&mut xs, &mut ys)?;
        let coords: Vec<Coord<f64>> = xs.into_iter().zip(ys).map(|(x, y)| Coord { x, y }).collect();
        Ok(Polygon::new(LineString::from(coords), vec![]))
    }
}

fn traditional_order(srs: gdal::errors::Result<SpatialRef>) -> NdviResult<SpatialRef> {
    let mut srs = srs.map_err(|e| NdviError::Geometry(format!("invalid spatial reference: {}", e)))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// AOI ring in (lon, lat), counter-clockwise from the south-west corner
///
/// `densify` extra vertices are inserted along every edge so curved edges in
/// the target CRS are followed more closely.
pub fn aoi_polygon(aoi: &AreaOfInterest, densify: usize) -> Polygon<f64> {
    let corners = [
        (aoi.west, aoi.south),
        (aoi.east, aoi.south),
        (aoi.east, aoi.north),
        (aoi.west, aoi.north),
    ];

    let steps = densify + 1;
    let mut coords = Vec::with_capacity(corners.len() * steps + 1);
    for (i, &(x0, y0)) in corners.iter().enumerate() {
        let (x1, y1) = corners[(i + 1) % corners.len()];
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            coords.push(Coord {
                x: x0 + t * (x1 - x0),
                y: y0 + t * (y1 - y0),
            });
        }
    }

    Polygon::new(LineString::from(coords), vec![])
}

/// The AOI expressed in the raster's native CRS
pub fn reproject_aoi(
    aoi: &AreaOfInterest,
    densify: usize,
    to_native: &dyn CrsTransform,
) -> NdviResult<Polygon<f64>> {
    let native = to_native.project_polygon(&aoi_polygon(aoi, densify))?;
    log::debug!(
        "AOI reprojected to native CRS: {:?}",
        native.exterior().coords().map(|c| (c.x, c.y)).collect::<Vec<_>>()
    );
    Ok(native)
}

/// Geographic bounds of a clipped array for map display
///
/// The upper-left and lower-right corners of the extent are projected back to
/// WGS84; south-west takes the lower-right latitude and upper-left longitude,
/// north-east the upper-left latitude and lower-right longitude.
pub fn geographic_bounds(
    shape: (usize, usize),
    geo_transform: &GeoTransform,
    to_geographic: &dyn CrsTransform,
) -> NdviResult<GeoBounds> {
    let (rows, cols) = shape;
    let (ulx, uly) = geo_transform.pixel_to_world(0.0, 0.0);
    let (lrx, lry) = geo_transform.pixel_to_world(cols as f64, rows as f64);

    let (ul_lon, ul_lat) = to_geographic.project_point(ulx, uly)?;
    let (lr_lon, lr_lat) = to_geographic.project_point(lrx, lry)?;

    Ok(GeoBounds {
        south_west: LatLon { lat: lr_lat, lon: ul_lon },
        north_east: LatLon { lat: ul_lat, lon: lr_lon },
    })
}
