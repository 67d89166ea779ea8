use crate::types::SeriesRow;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Next-season peak prediction, or why none could be made
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ForecastResult {
    Prediction {
        next_year: i32,
        predicted_doy: i64,
        predicted_pos_date: String,
    },
    InsufficientData {
        message: String,
    },
}

impl ForecastResult {
    fn insufficient(message: impl Into<String>) -> Self {
        ForecastResult::InsufficientData {
            message: message.into(),
        }
    }
}

/// Observed seasonal peak of one year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearPeak {
    pub year: i32,
    pub doy: u32,
    pub mean_ndvi: f64,
}

/// For each year, the acquisition with the highest mean NDVI (earliest on ties)
pub fn yearly_peaks(rows: &[SeriesRow]) -> Vec<YearPeak> {
    let mut sorted: Vec<&SeriesRow> = rows.iter().filter(|r| r.mean_ndvi.is_finite()).collect();
    sorted.sort_by_key(|r| (r.year, r.doy));

    let mut peaks: BTreeMap<i32, YearPeak> = BTreeMap::new();
    for row in sorted {
        let candidate = YearPeak {
            year: row.year,
            doy: row.doy,
            mean_ndvi: row.mean_ndvi,
        };
        peaks
            .entry(row.year)
            .and_modify(|peak| {
                if candidate.mean_ndvi > peak.mean_ndvi {
                    *peak = candidate;
                }
            })
            .or_insert(candidate);
    }
    peaks.into_values().collect()
}

/// Ordinary least squares fit `y = intercept + slope * x`
///
/// Returns `None` when x has no spread.
pub fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some((mean_y - slope * mean_x, slope))
}

pub struct TrendForecaster;

impl TrendForecaster {
    pub fn forecast(rows: &[SeriesRow]) -> ForecastResult {
        let peaks = yearly_peaks(rows);
        if peaks.is_empty() {
            return ForecastResult::insufficient("Not enough data for forecast.");
        }
        if peaks.len() < 2 {
            return ForecastResult::insufficient("At least two years of data are needed to forecast.");
        }

        // Centering on the mean year keeps the prediction exact for integer trends
        let mean_year = peaks.iter().map(|p| p.year as f64).sum::<f64>() / peaks.len() as f64;
        let points: Vec<(f64, f64)> = peaks
            .iter()
            .map(|p| (p.year as f64 - mean_year, p.doy as f64))
            .collect();
        let Some((intercept, slope)) = fit_line(&points) else {
            return ForecastResult::insufficient("Peak years have no spread to fit a trend.");
        };

        let next_year = peaks.iter().map(|p| p.year).max().unwrap_or_default() + 1;
        let predicted = intercept + slope * (next_year as f64 - mean_year);
        let predicted_doy = predicted.trunc() as i64;
        log::debug!(
            "Peak trend: {:.3} days/year, predicted doy {:.3} for {}",
            slope,
            predicted,
            next_year
        );

        match doy_to_date(next_year, predicted_doy) {
            Some(date) => ForecastResult::Prediction {
                next_year,
                predicted_doy,
                predicted_pos_date: date.format("%Y-%m-%d").to_string(),
            },
            None => ForecastResult::insufficient(format!(
                "Predicted day-of-year {} for {} is outside the calendar range.",
                predicted_doy, next_year
            )),
        }
    }
}

/// January 1st of `year` plus `doy - 1` days; doy may fall outside 1..=366
pub fn doy_to_date(year: i32, doy: i64) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let offset = doy - 1;
    if offset >= 0 {
        jan1.checked_add_days(Days::new(offset as u64))
    } else {
        jan1.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}
