//! NaN-aware reductions shared by extraction and analysis

use num_traits::Float;

/// Mean of the finite values, `None` when there are none
pub fn nan_mean<T, I>(values: I) -> Option<T>
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((T::zero(), 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        return None;
    }
    T::from(count).map(|n| sum / n)
}

/// Share of finite values among all values; zero for an empty input
pub fn valid_fraction<T, I>(values: I) -> f64
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let (valid, total) = values
        .into_iter()
        .fold((0usize, 0usize), |(valid, total), v| {
            (valid + usize::from(!v.is_nan()), total + 1)
        });

    if total == 0 {
        0.0
    } else {
        valid as f64 / total as f64
    }
}

/// Centered moving average; windows shrink at the edges instead of dropping rows
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window.max(1) / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            nan_mean(values[lo..hi].iter().copied()).unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_mean_skips_nan() {
        let mean = nan_mean(vec![1.0, f64::NAN, 3.0]).unwrap();
        assert_relative_eq!(mean, 2.0);
        assert!(nan_mean(vec![f64::NAN, f64::NAN]).is_none());
        assert!(nan_mean(Vec::<f64>::new()).is_none());
    }

    #[test]
    fn test_valid_fraction() {
        assert_relative_eq!(valid_fraction(vec![1.0, f64::NAN, 3.0, f64::NAN]), 0.5);
        assert_eq!(valid_fraction(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_moving_average_edges() {
        let smooth = centered_moving_average(&[1.0, 2.0, 6.0, 4.0], 3);
        assert_relative_eq!(smooth[0], 1.5);
        assert_relative_eq!(smooth[1], 3.0);
        assert_relative_eq!(smooth[2], 4.0);
        assert_relative_eq!(smooth[3], 5.0);
    }

    #[test]
    fn test_moving_average_single_point() {
        assert_eq!(centered_moving_average(&[0.42], 3), vec![0.42]);
    }
}
