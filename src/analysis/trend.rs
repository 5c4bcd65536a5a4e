//! Linear trend of yearly counts.
//!
//! Ordinary least squares of count on year with a classical t-test on the
//! slope. Adjacent years of incident counts are usually serially
//! correlated, which makes this p-value optimistic. No correction is
//! applied; the Durbin-Watson statistic is reported so readers can judge.

use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::AnalysisError;
use crate::models::{TrendFit, YearlyCount};

/// Minimum number of distinct years for a trend fit.
pub const MIN_TREND_YEARS: usize = 3;

/// Fit `count = intercept + slope * (year - base_year)`.
pub fn fit_linear_trend(counts: &[YearlyCount]) -> Result<TrendFit, AnalysisError> {
    let distinct: BTreeSet<i32> = counts.iter().map(|c| c.year).collect();
    if distinct.len() < MIN_TREND_YEARS {
        return Err(AnalysisError::insufficient(format!(
            "need at least {} distinct years for a trend fit, got {}",
            MIN_TREND_YEARS,
            distinct.len()
        )));
    }

    let mut points = counts.to_vec();
    points.sort_by_key(|c| c.year);
    let base_year = points[0].year;

    let n = points.len();
    let xs: Vec<f64> = points.iter().map(|c| f64::from(c.year - base_year)).collect();
    let ys: Vec<f64> = points.iter().map(|c| c.count as f64).collect();

    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let residuals: Vec<f64> = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| y - (intercept + slope * x))
        .collect();
    let sse: f64 = residuals.iter().map(|e| e * e).sum();

    let r_squared = if syy == 0.0 { 1.0 } else { 1.0 - sse / syy };

    let degrees_of_freedom = n - 2;
    let std_error = (sse / degrees_of_freedom as f64 / sxx).sqrt();

    let (t_statistic, p_value_for_slope) = if std_error == 0.0 {
        if slope == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(slope), 0.0)
        }
    } else {
        let t = slope / std_error;
        let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64)
            .map_err(|e| AnalysisError::insufficient(e.to_string()))?;
        let p = 2.0 * (1.0 - dist.cdf(t.abs()));
        (t, p.clamp(0.0, 1.0))
    };

    let durbin_watson = (sse > 0.0).then(|| {
        residuals
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).powi(2))
            .sum::<f64>()
            / sse
    });

    debug!(
        "Trend fit over {} years: slope={:.3} p={:.4} r2={:.4}",
        n, slope, p_value_for_slope, r_squared
    );

    Ok(TrendFit {
        base_year,
        slope,
        intercept,
        p_value_for_slope,
        r_squared,
        std_error,
        t_statistic,
        degrees_of_freedom,
        n_years: n,
        durbin_watson,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    fn series(start: i32, counts: &[usize]) -> Vec<YearlyCount> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| YearlyCount {
                year: start + i as i32,
                count,
            })
            .collect()
    }

    #[test]
    fn test_noise_free_line() {
        let counts: Vec<YearlyCount> = (1991..=2020)
            .map(|year| YearlyCount {
                year,
                count: (100 + 50 * (year - 1991)) as usize,
            })
            .collect();

        let fit = fit_linear_trend(&counts).unwrap();

        assert_eq!(fit.base_year, 1991);
        assert_eq!(fit.n_years, 30);
        assert_eq!(fit.degrees_of_freedom, 28);
        assert_close(fit.slope, 50.0, 1e-9);
        assert_close(fit.intercept, 100.0, 1e-6);
        assert_close(fit.r_squared, 1.0, 1e-12);
        assert!(fit.p_value_for_slope < 1e-10);
        assert_close(fit.predict(2020), 1550.0, 1e-6);
    }

    #[test]
    fn test_noisy_reference_fit() {
        let fit = fit_linear_trend(&series(2000, &[2, 4, 5, 4, 5])).unwrap();

        assert_close(fit.slope, 0.6, 1e-12);
        assert_close(fit.intercept, 2.8, 1e-12);
        assert_close(fit.r_squared, 0.6, 1e-12);
        assert_close(fit.std_error, 0.08f64.sqrt(), 1e-12);
        assert_close(fit.t_statistic, 2.1213203435596424, 1e-9);
        assert_close(fit.p_value_for_slope, 0.12402706265755459, 1e-6);
        assert_close(fit.durbin_watson.unwrap(), 4.84 / 2.4, 1e-9);
    }

    #[test]
    fn test_unsorted_input() {
        let mut counts = series(2000, &[2, 4, 5, 4, 5]);
        counts.reverse();
        let fit = fit_linear_trend(&counts).unwrap();
        assert_eq!(fit.base_year, 2000);
        assert_close(fit.slope, 0.6, 1e-12);
    }

    #[test]
    fn test_flat_series() {
        let fit = fit_linear_trend(&series(2010, &[7, 7, 7, 7])).unwrap();
        assert_close(fit.slope, 0.0, 1e-12);
        assert_eq!(fit.p_value_for_slope, 1.0);
        assert_eq!(fit.r_squared, 1.0);
        assert_eq!(fit.durbin_watson, None);
    }

    #[test]
    fn test_requires_three_distinct_years() {
        let err = fit_linear_trend(&series(2000, &[1, 2])).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));

        let repeated = vec![
            YearlyCount { year: 2000, count: 1 },
            YearlyCount { year: 2000, count: 2 },
            YearlyCount { year: 2001, count: 3 },
        ];
        assert!(fit_linear_trend(&repeated).is_err());
        assert!(fit_linear_trend(&[]).is_err());
    }
}
