use crate::config::MaskingConfig;
use crate::types::{NdviError, NdviResult};

/// One entry of a container's subdataset list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subdataset {
    /// GDAL-openable identifier, e.g. `HDF4_EOS:EOS_GRID:"f.hdf":Grid:250m 16 days NDVI`
    pub name: String,
    /// Human-readable description
    pub description: String,
}

/// Bands selected for one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBands {
    pub ndvi: Subdataset,
    pub quality: Option<Subdataset>,
}

/// Picks the NDVI and quality subdatasets by description
#[derive(Debug, Clone)]
pub struct BandResolver {
    ndvi_pattern: String,
    quality_patterns: Vec<String>,
}

impl BandResolver {
    pub fn new(ndvi_pattern: impl Into<String>, quality_patterns: Vec<String>) -> Self {
        Self {
            ndvi_pattern: ndvi_pattern.into(),
            quality_patterns,
        }
    }

    pub fn from_config(config: &MaskingConfig) -> Self {
        Self::new(config.ndvi_band_pattern.clone(), config.quality_band_patterns.clone())
    }

    /// Resolve bands; `file` only labels the error
    pub fn resolve(&self, subdatasets: &[Subdataset], file: &str) -> NdviResult<ResolvedBands> {
        let ndvi = subdatasets
            .iter()
            .find(|sds| sds.description.contains(&self.ndvi_pattern))
            .cloned()
            .ok_or_else(|| NdviError::BandNotFound { file: file.to_string() })?;

        // Patterns are tried in priority order, not subdataset order
        let quality = self.quality_patterns.iter().find_map(|pattern| {
            subdatasets
                .iter()
                .find(|sds| sds.description.contains(pattern.as_str()))
                .cloned()
        });

        match &quality {
            Some(q) => log::debug!("{}: NDVI '{}', quality '{}'", file, ndvi.description, q.description),
            None => log::debug!("{}: NDVI '{}', no quality band, masking skipped", file, ndvi.description),
        }

        Ok(ResolvedBands { ndvi, quality })
    }
}
