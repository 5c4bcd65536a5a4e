//! Analysis stages.
//!
//! [`analyze`] runs every analysis over one table. An analysis that lacks
//! data is recorded as unavailable and the others still run.

pub mod aggregator;
pub mod stats;
pub mod trend;

pub use aggregator::*;
pub use stats::*;
pub use trend::*;

use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::models::{Analysis, AnalysisResults, DataQuality, Field, IncidentTable};

/// Parameters for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Entries kept in each ranking.
    pub top_k: usize,
    /// Field used for the year × category shares.
    pub share_field: Field,
    /// Categories for the shares; empty means all observed values.
    pub share_categories: Vec<String>,
    pub quartile_method: QuartileMethod,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            top_k: config.top_k,
            share_field: config.share_field.into(),
            share_categories: config.share_categories.clone(),
            quartile_method: config.quartile_method,
        }
    }
}

/// Run every analysis over the table.
pub fn analyze(table: &IncidentTable, options: &AnalysisOptions) -> AnalysisResults {
    let yearly_counts = count_by_year(table);
    info!(
        "Counted {} years ({} rows excluded for missing or malformed dates)",
        yearly_counts.counts.len(),
        yearly_counts.excluded()
    );

    let year_gaps = yearly_counts.gaps();
    if !year_gaps.is_empty() {
        warn!(
            "Years with no incidents inside the observed range: {:?}; the trend fit treats years as contiguous",
            year_gaps
        );
    }

    let summary = skip_if_insufficient(
        "summary statistics",
        summarize_yearly_counts(&yearly_counts.counts, options.quartile_method),
    );
    let trend = skip_if_insufficient("trend fit", fit_linear_trend(&yearly_counts.counts));
    let top_bias = skip_if_insufficient(
        "bias ranking",
        top_categories(table, &Field::Bias, options.top_k),
    );
    let top_locations = skip_if_insufficient(
        "location ranking",
        top_categories(table, &Field::Location, options.top_k),
    );
    let shares = skip_if_insufficient(
        "share breakdown",
        share_by_year_and_category(table, &options.share_field, &options.share_categories),
    );

    let available = [
        summary.is_available(),
        trend.is_available(),
        top_bias.is_available(),
        top_locations.is_available(),
        shares.is_available(),
    ]
    .into_iter()
    .filter(|ok| *ok)
    .count();
    info!("{} of 5 analyses available", available);

    let data_quality = DataQuality {
        total_rows: table.len(),
        unreadable_rows: table.unreadable_rows,
        missing_dates: yearly_counts.missing_dates,
        malformed_dates: yearly_counts.malformed_dates,
        year_gaps,
        missing_by_field: missing_by_field(table, &[Field::Bias, Field::Location]),
    };

    AnalysisResults {
        total_rows: table.len(),
        yearly_counts,
        summary,
        trend,
        top_bias,
        top_locations,
        shares,
        data_quality,
    }
}

fn skip_if_insufficient<T>(name: &str, result: Result<T, crate::error::AnalysisError>) -> Analysis<T> {
    if let Err(ref e) = result {
        warn!("Skipping {}: {}", name, e);
    }
    result.into()
}
