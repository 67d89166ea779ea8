//! Season start, peak and end from the smoothed NDVI series
//!
//! The series is smoothed with a centered moving average; the season is the
//! span where the smoothed value reaches `min + f * (max - min)`.

use crate::config::PhenologyConfig;
use crate::core::stats::centered_moving_average;
use crate::types::SeriesRow;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Slack on the threshold comparison so rounding in the moving average
/// cannot drop rows of a flat series
const THRESHOLD_EPSILON: f64 = 1e-12;

/// Placeholder emitted for markers that cannot be determined
pub const UNAVAILABLE: &str = "N/A";

/// Raw and smoothed value of one acquisition, for charting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhenologyPoint {
    pub date: String,
    pub mean_ndvi: f64,
    pub ndvi_smooth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhenologyResult {
    #[serde(serialize_with = "date_or_unavailable")]
    pub start_of_season: Option<NaiveDate>,
    #[serde(serialize_with = "date_or_unavailable")]
    pub peak_of_season: Option<NaiveDate>,
    #[serde(serialize_with = "date_or_unavailable")]
    pub end_of_season: Option<NaiveDate>,
    /// Unsmoothed mean NDVI on the peak date
    #[serde(serialize_with = "value_or_unavailable")]
    pub peak_ndvi: Option<f64>,
    pub threshold_value: Option<f64>,
    pub timeseries: Vec<PhenologyPoint>,
}

fn date_or_unavailable<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_str(UNAVAILABLE),
    }
}

fn value_or_unavailable<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64((v * 1000.0).round() / 1000.0),
        None => serializer.serialize_str(UNAVAILABLE),
    }
}

pub struct PhenologyAnalyzer {
    config: PhenologyConfig,
}

impl PhenologyAnalyzer {
    pub fn new(config: PhenologyConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, rows: &[SeriesRow]) -> PhenologyResult {
        let mut series: Vec<(NaiveDate, f64)> = rows
            .iter()
            .filter(|row| row.mean_ndvi.is_finite())
            .filter_map(|row| match row.date() {
                Some(date) => Some((date, row.mean_ndvi)),
                None => {
                    log::warn!("Ignoring row with invalid date {}-{:03}", row.year, row.doy);
                    None
                }
            })
            .collect();
        series.sort_by_key(|(date, _)| *date);

        if series.is_empty() {
            log::warn!("Empty NDVI series, no phenology markers");
            return PhenologyResult {
                start_of_season: None,
                peak_of_season: None,
                end_of_season: None,
                peak_ndvi: None,
                threshold_value: None,
                timeseries: Vec::new(),
            };
        }

        let raw: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let smooth = centered_moving_average(&raw, self.config.smoothing_window);

        let min = smooth.iter().copied().fold(f64::INFINITY, f64::min);
        let max = smooth.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let threshold = min + self.config.threshold_fraction * (max - min);

        let above = |i: &usize| smooth[*i] + THRESHOLD_EPSILON >= threshold;
        let start = (0..smooth.len()).find(above);
        let end = (0..smooth.len()).rev().find(above);

        // First occurrence wins on ties
        let mut peak = 0;
        for (i, v) in smooth.iter().enumerate() {
            if *v > smooth[peak] {
                peak = i;
            }
        }

        log::debug!(
            "Phenology: min {:.4}, max {:.4}, threshold {:.4}, start {:?}, peak {}, end {:?}",
            min,
            max,
            threshold,
            start,
            peak,
            end
        );

        let timeseries = series
            .iter()
            .zip(&smooth)
            .map(|((date, mean), smooth)| PhenologyPoint {
                date: date.format("%Y-%m-%d").to_string(),
                mean_ndvi: *mean,
                ndvi_smooth: *smooth,
            })
            .collect();

        PhenologyResult {
            start_of_season: start.map(|i| series[i].0),
            peak_of_season: Some(series[peak].0),
            end_of_season: end.map(|i| series[i].0),
            peak_ndvi: Some(series[peak].1),
            threshold_value: Some(threshold),
            timeseries,
        }
    }
}
