use crate::core::band_resolver::Subdataset;
use crate::types::{GeoTransform, NativeRaster, NdviError, NdviResult};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A multi-subdataset raster container (HDF4-EOS for MODIS products)
pub struct HdfContainer {
    path: PathBuf,
    subdatasets: Vec<Subdataset>,
}

impl HdfContainer {
    /// Open the container and list its subdatasets
    pub fn open<P: AsRef<Path>>(path: P) -> NdviResult<Self> {
        let path = path.as_ref();
        log::debug!("Opening container: {}", path.display());

        let dataset = Dataset::open(path)?;
        let entries = dataset.metadata_domain("SUBDATASETS").unwrap_or_default();
        let subdatasets = parse_subdataset_metadata(&entries);

        log::debug!("{} subdatasets in {}", subdatasets.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            subdatasets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subdatasets(&self) -> &[Subdataset] {
        &self.subdatasets
    }

    /// Read the first band of a subdataset with its georeferencing
    pub fn read_subdataset(&self, subdataset: &Subdataset) -> NdviResult<NativeRaster> {
        read_native_raster(&subdataset.name)
    }
}

/// Read band 1 of any GDAL-openable dataset as f64
pub fn read_native_raster(name: &str) -> NdviResult<NativeRaster> {
    let dataset = Dataset::open(Path::new(name))?;

    let geo_transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let projection = dataset.projection();
    if projection.trim().is_empty() {
        return Err(NdviError::Geometry(format!("{} carries no projection", name)));
    }

    let (width, height) = dataset.raster_size();
    log::debug!("Raster size: {}x{}", width, height);
    log::debug!("Geotransform: {:?}", geo_transform);

    let band = dataset.rasterband(1)?;
    let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
    let data = Array2::from_shape_vec((height, width), buffer.data().to_vec())
        .map_err(|e| NdviError::Processing(format!("Failed to reshape band data: {}", e)))?;

    Ok(NativeRaster {
        data,
        geo_transform,
        projection,
    })
}

/// Pair up `SUBDATASET_<n>_NAME` / `SUBDATASET_<n>_DESC` metadata entries
pub fn parse_subdataset_metadata(entries: &[String]) -> Vec<Subdataset> {
    let mut by_index: BTreeMap<usize, (Option<String>, Option<String>)> = BTreeMap::new();

    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let Some(rest) = key.strip_prefix("SUBDATASET_") else {
            continue;
        };
        let Some((index, kind)) = rest.split_once('_') else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };

        let slot = by_index.entry(index).or_default();
        match kind {
            "NAME" => slot.0 = Some(value.to_string()),
            "DESC" => slot.1 = Some(value.to_string()),
            _ => {}
        }
    }

    by_index
        .into_values()
        .filter_map(|(name, description)| {
            name.map(|name| Subdataset {
                name,
                description: description.unwrap_or_default(),
            })
        })
        .collect()
}
