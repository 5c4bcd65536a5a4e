//! Descriptive statistics of yearly incident counts.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::{CountSummary, YearlyCount};

/// How quartiles interpolate between order statistics.
///
/// Both methods interpolate linearly; they differ in where the p-th
/// quantile sits among the sorted values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QuartileMethod {
    /// Position `(n - 1) * p` (0-based). Default of most statistical tooling.
    #[default]
    Linear,
    /// Position `(n + 1) * p` (1-based), clamped to the observed range.
    Exclusive,
}

impl QuartileMethod {
    /// Quantile `p` of an ascending slice. `NaN` when the slice is empty.
    pub(crate) fn quantile(self, sorted: &[f64], p: f64) -> f64 {
        let n = sorted.len();
        if n == 0 {
            return f64::NAN;
        }
        let last = (n - 1) as f64;
        let position = match self {
            QuartileMethod::Linear => last * p,
            QuartileMethod::Exclusive => ((n + 1) as f64 * p - 1.0).clamp(0.0, last),
        };

        let lower = position.floor() as usize;
        let upper = (lower + 1).min(n - 1);
        let fraction = position - lower as f64;
        sorted[lower] + fraction * (sorted[upper] - sorted[lower])
    }
}

/// Summarise yearly counts: mean, median, quartiles and sample SD.
///
/// Needs at least two years for the sample standard deviation.
pub fn summarize_yearly_counts(
    counts: &[YearlyCount],
    method: QuartileMethod,
) -> Result<CountSummary, AnalysisError> {
    let n = counts.len();
    if n < 2 {
        return Err(AnalysisError::insufficient(format!(
            "need at least 2 years for summary statistics, got {}",
            n
        )));
    }

    let mut values: Vec<f64> = counts.iter().map(|c| c.count as f64).collect();
    values.sort_by(f64::total_cmp);

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };

    let q1 = method.quantile(&values, 0.25);
    let q3 = method.quantile(&values, 0.75);

    Ok(CountSummary {
        n,
        mean,
        median,
        q1,
        q3,
        interquartile_range: q3 - q1,
        standard_deviation: variance.sqrt(),
        min: counts.iter().map(|c| c.count).min().unwrap_or(0),
        max: counts.iter().map(|c| c.count).max().unwrap_or(0),
        quartile_method: method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yearly(values: &[usize]) -> Vec<YearlyCount> {
        values
            .iter()
            .enumerate()
            .map(|(i, &count)| YearlyCount {
                year: 2000 + i as i32,
                count,
            })
            .collect()
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_summary_reference_values() {
        let summary =
            summarize_yearly_counts(&yearly(&[5, 7, 7, 9, 11]), QuartileMethod::Linear).unwrap();

        assert_eq!(summary.n, 5);
        assert_close(summary.mean, 7.8, 1e-12);
        assert_close(summary.median, 7.0, 1e-12);
        assert_close(summary.q1, 7.0, 1e-12);
        assert_close(summary.q3, 9.0, 1e-12);
        assert_close(summary.interquartile_range, 2.0, 1e-12);
        assert_close(summary.standard_deviation, 2.280350850198276, 1e-9);
        assert_eq!(summary.min, 5);
        assert_eq!(summary.max, 11);
    }

    #[test]
    fn test_summary_exclusive_quartiles() {
        let summary =
            summarize_yearly_counts(&yearly(&[5, 7, 7, 9, 11]), QuartileMethod::Exclusive)
                .unwrap();

        assert_close(summary.q1, 6.0, 1e-12);
        assert_close(summary.q3, 10.0, 1e-12);
        assert_close(summary.interquartile_range, 4.0, 1e-12);
        assert_close(summary.median, 7.0, 1e-12);
    }

    #[test]
    fn test_summary_is_order_independent() {
        let a = summarize_yearly_counts(&yearly(&[11, 5, 9, 7, 7]), QuartileMethod::Linear).unwrap();
        let b = summarize_yearly_counts(&yearly(&[5, 7, 7, 9, 11]), QuartileMethod::Linear).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_even_count() {
        let summary = summarize_yearly_counts(&yearly(&[1, 2, 3, 4]), QuartileMethod::Linear).unwrap();
        assert_close(summary.median, 2.5, 1e-12);
        assert_close(summary.q1, 1.75, 1e-12);
        assert_close(summary.q3, 3.25, 1e-12);
    }

    #[test]
    fn test_exclusive_clamps_small_samples() {
        let sorted = [3.0, 8.0];
        assert_close(QuartileMethod::Exclusive.quantile(&sorted, 0.25), 3.0, 1e-12);
        assert_close(QuartileMethod::Exclusive.quantile(&sorted, 0.75), 8.0, 1e-12);
    }

    #[test]
    fn test_quantile_of_empty_slice() {
        assert!(QuartileMethod::Linear.quantile(&[], 0.5).is_nan());
        assert!(QuartileMethod::Exclusive.quantile(&[], 0.25).is_nan());
        assert_close(QuartileMethod::Linear.quantile(&[4.0], 0.75), 4.0, 1e-12);
    }

    #[test]
    fn test_summary_needs_two_years() {
        let err = summarize_yearly_counts(&yearly(&[42]), QuartileMethod::Linear).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
        assert!(summarize_yearly_counts(&[], QuartileMethod::Linear).is_err());
    }
}
