use crate::config::MaskingConfig;
use crate::types::{NdviError, NdviImage, NdviResult, RawBand};
use ndarray::Zip;

/// Scale raw NDVI integers and blank out unreliable pixels
///
/// Pixels whose reliability code exceeds `quality_threshold` become NaN.
/// Without a quality band the scaled values pass through untouched.
pub fn scale_and_mask(
    raw: &RawBand,
    quality: Option<&RawBand>,
    config: &MaskingConfig,
) -> NdviResult<NdviImage> {
    let scale = config.ndvi_scale;
    let mut ndvi = raw.mapv(|v| v * scale);

    let Some(quality) = quality else {
        return Ok(ndvi);
    };

    if quality.dim() != ndvi.dim() {
        return Err(NdviError::InvalidFormat(format!(
            "quality band shape {:?} does not match NDVI shape {:?}",
            quality.dim(),
            ndvi.dim()
        )));
    }

    let threshold = config.quality_threshold;
    let mut masked = 0usize;
    Zip::from(&mut ndvi).and(quality).for_each(|v, &q| {
        if !(q <= threshold) {
            *v = f64::NAN;
            masked += 1;
        }
    });

    log::debug!(
        "Quality mask removed {} of {} pixels ({:.2}%)",
        masked,
        ndvi.len(),
        100.0 * masked as f64 / ndvi.len().max(1) as f64
    );

    Ok(ndvi)
}

/// Unify the sensor fill value with the NaN convention
pub fn unify_nodata(data: &mut NdviImage, scaled_nodata: f64) -> usize {
    let mut replaced = 0usize;
    data.mapv_inplace(|v| {
        if (v - scaled_nodata).abs() < 1e-9 {
            replaced += 1;
            f64::NAN
        } else {
            v
        }
    });
    replaced
}
