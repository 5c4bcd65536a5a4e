//! Report generation.
//!
//! This module turns [`AnalysisResults`] into a [`Report`] with narrative
//! text, and renders it as Markdown or JSON.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use crate::config::ReportConfig;
use crate::models::{
    Analysis, AnalysisResults, CategoryRanking, CountSummary, DataQuality, Report,
    ReportMetadata, ShareBreakdown, TrendFit, YearlyCounts,
};

/// p-values below this are called significant in the narrative.
const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Assemble the report for a finished analysis.
pub fn build_report(source: &Path, results: AnalysisResults, duration_seconds: f64) -> Report {
    let year_range = match (
        results.yearly_counts.counts.first(),
        results.yearly_counts.counts.last(),
    ) {
        (Some(first), Some(last)) => Some((first.year, last.year)),
        _ => None,
    };

    let metadata = ReportMetadata {
        source: source.display().to_string(),
        analysis_date: Utc::now(),
        rows_loaded: results.total_rows,
        year_range,
        duration_seconds,
    };

    Report {
        metadata,
        narrative: build_narrative(&results),
        assumptions: assumptions(&results),
        results,
    }
}

/// Plain-language findings, one paragraph per analysis that ran.
pub fn build_narrative(results: &AnalysisResults) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let yearly = &results.yearly_counts;

    match (yearly.counts.first(), yearly.counts.last()) {
        (Some(first), Some(last)) => paragraphs.push(format!(
            "The dataset contains {} incidents. {} carry a usable date, spanning {} to {}.",
            results.total_rows,
            yearly.total(),
            first.year,
            last.year
        )),
        _ => paragraphs.push(format!(
            "The dataset contains {} incidents, none with a usable date.",
            results.total_rows
        )),
    }

    if let Some(summary) = results.summary.as_available() {
        paragraphs.push(format!(
            "Yearly counts average {:.0} incidents (median {:.0}, standard deviation {:.0}, \
             interquartile range {:.0}), ranging from {} to {} per year.",
            summary.mean,
            summary.median,
            summary.standard_deviation,
            summary.interquartile_range,
            summary.min,
            summary.max
        ));
    }

    if let (Some(trend), Some(last)) = (results.trend.as_available(), yearly.counts.last()) {
        paragraphs.push(trend_sentence(trend, last.year));
    }

    for (label, ranking) in [
        ("bias motivation", &results.top_bias),
        ("location", &results.top_locations),
    ] {
        let Some(ranking) = ranking.as_available() else {
            continue;
        };
        if let Some(top) = ranking.entries.first() {
            paragraphs.push(format!(
                "The most frequently reported {} is {} with {} incidents \
                 ({:.1}% of incidents where it was recorded).",
                label,
                top.category,
                top.count,
                ranking.share_of(top) * 100.0
            ));
        }
    }

    if let (Some(breakdown), Some(last)) =
        (results.shares.as_available(), yearly.counts.last())
    {
        if breakdown.subset.is_empty() {
            if let Some(leading) = breakdown.for_year(last.year).next() {
                paragraphs.push(format!(
                    "In {}, {} accounts for the largest share of incidents with a recorded \
                     `{}` ({:.1}%).",
                    last.year,
                    leading.category,
                    breakdown.field,
                    leading.share * 100.0
                ));
            }
        }
    }

    paragraphs
}

fn trend_sentence(trend: &TrendFit, last_year: i32) -> String {
    let direction = if trend.slope > 0.0 {
        "rose"
    } else if trend.slope < 0.0 {
        "fell"
    } else {
        "held flat"
    };
    let significance = if trend.p_value_for_slope < SIGNIFICANCE_LEVEL {
        "statistically significant"
    } else {
        "not statistically significant"
    };

    format!(
        "Across {} years, counts {} by about {:.1} incidents per year \
         (R² = {:.2}, p {}); the trend is {} at the 5% level under the \
         independence assumption. The fitted line runs from {:.0} incidents in {} \
         to {:.0} in {}.",
        trend.n_years,
        direction,
        trend.slope.abs(),
        trend.r_squared,
        format_p_value(trend.p_value_for_slope),
        significance,
        trend.predict(trend.base_year),
        trend.base_year,
        trend.predict(last_year),
        last_year
    )
}

/// Modelling choices a reader needs to interpret the numbers.
pub fn assumptions(results: &AnalysisResults) -> Vec<String> {
    let mut notes = vec![
        "The trend p-value comes from a classical t-test on the OLS slope and assumes \
         independent errors. Counts in adjacent years are likely serially correlated, \
         so the p-value is probably optimistic; no correction is applied."
            .to_string(),
        "Shares use the incidents of that year with a recorded value for the field as \
         the denominator, not all incidents of the year. Missing values are excluded, \
         which changes every percentage when missingness varies across years."
            .to_string(),
    ];

    if let Some(summary) = results.summary.as_available() {
        notes.push(format!(
            "Quartiles use {:?} interpolation between order statistics; standard \
             deviation uses the sample (n - 1) formula.",
            summary.quartile_method
        ));
    }

    if !results.data_quality.year_gaps.is_empty() {
        notes.push(format!(
            "Years {} have no incidents in the data; the trend fit treats the observed \
             years as a contiguous series.",
            join_years(&results.data_quality.year_gaps)
        ));
    }

    notes
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();
    let results = &report.results;

    // Title
    output.push_str("# Hate Crime Incident Analysis\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_overview_section(&report.narrative));
    output.push_str(&generate_yearly_section(
        &results.yearly_counts,
        &results.summary,
        options.include_yearly_table,
    ));
    output.push_str(&generate_trend_section(&results.trend));
    output.push_str(&generate_ranking_section(
        "Top Bias Motivations",
        &results.top_bias,
    ));
    output.push_str(&generate_ranking_section("Top Locations", &results.top_locations));

    if options.include_shares {
        output.push_str(&generate_share_section(&results.shares, options.max_share_rows));
    }

    output.push_str(&generate_data_quality_section(&results.data_quality));
    output.push_str(&generate_assumptions_section(&report.assumptions));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows Loaded:** {}\n", metadata.rows_loaded));
    if let Some((first, last)) = metadata.year_range {
        section.push_str(&format!("- **Years Covered:** {}–{}\n", first, last));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the narrative overview.
fn generate_overview_section(narrative: &[String]) -> String {
    if narrative.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Overview\n\n");
    for paragraph in narrative {
        section.push_str(paragraph);
        section.push_str("\n\n");
    }
    section
}

/// Generate the yearly counts and their descriptive statistics.
fn generate_yearly_section(
    yearly: &YearlyCounts,
    summary: &Analysis<CountSummary>,
    include_table: bool,
) -> String {
    let mut section = String::new();

    section.push_str("## Incidents per Year\n\n");

    match summary {
        Analysis::Available(summary) => {
            section.push_str("| Years | Mean | Median | Q1 | Q3 | IQR | Std. Dev. | Min | Max |\n");
            section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|:---:|:---:|:---:|\n");
            section.push_str(&format!(
                "| {} | {:.1} | {:.1} | {:.1} | {:.1} | {:.1} | {:.1} | {} | {} |\n\n",
                summary.n,
                summary.mean,
                summary.median,
                summary.q1,
                summary.q3,
                summary.interquartile_range,
                summary.standard_deviation,
                summary.min,
                summary.max
            ));
        }
        Analysis::Unavailable { reason } => section.push_str(&unavailable_note(reason)),
    }

    if include_table && !yearly.counts.is_empty() {
        section.push_str("| Year | Incidents |\n");
        section.push_str("|:---|---:|\n");
        for entry in &yearly.counts {
            section.push_str(&format!("| {} | {} |\n", entry.year, entry.count));
        }
        section.push('\n');
    }

    section
}

/// Generate the trend section.
fn generate_trend_section(trend: &Analysis<TrendFit>) -> String {
    let mut section = String::new();

    section.push_str("## Trend\n\n");

    let trend = match trend {
        Analysis::Available(trend) => trend,
        Analysis::Unavailable { reason } => {
            section.push_str(&unavailable_note(reason));
            return section;
        }
    };

    section.push_str("| Statistic | Value |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Slope (incidents/year) | {:.2} |\n", trend.slope));
    section.push_str(&format!(
        "| Intercept (at {}) | {:.1} |\n",
        trend.base_year, trend.intercept
    ));
    section.push_str(&format!("| Std. error of slope | {:.3} |\n", trend.std_error));
    section.push_str(&format!("| t statistic | {:.2} |\n", trend.t_statistic));
    section.push_str(&format!(
        "| p-value (slope) | {} |\n",
        format_p_value(trend.p_value_for_slope)
    ));
    section.push_str(&format!("| R² | {:.3} |\n", trend.r_squared));
    section.push_str(&format!(
        "| Degrees of freedom | {} |\n",
        trend.degrees_of_freedom
    ));
    if let Some(dw) = trend.durbin_watson {
        section.push_str(&format!("| Durbin–Watson | {:.2} |\n", dw));
    }
    section.push('\n');

    section
}

/// Generate a top-k ranking table.
fn generate_ranking_section(title: &str, ranking: &Analysis<CategoryRanking>) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    let ranking = match ranking {
        Analysis::Available(ranking) => ranking,
        Analysis::Unavailable { reason } => {
            section.push_str(&unavailable_note(reason));
            return section;
        }
    };

    section.push_str("| Rank | Category | Incidents | Share |\n");
    section.push_str("|:---:|:---|---:|---:|\n");
    for entry in &ranking.entries {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1}% |\n",
            entry.rank,
            entry.category,
            entry.count,
            ranking.share_of(entry) * 100.0
        ));
    }
    section.push('\n');

    section.push_str(&format!(
        "*{} distinct values; shares are of {} rows with a recorded `{}`. {} rows have no value.*\n\n",
        ranking.distinct, ranking.non_null, ranking.field, ranking.missing
    ));

    section
}

/// Generate the year × category share table.
fn generate_share_section(shares: &Analysis<ShareBreakdown>, max_rows: usize) -> String {
    let mut section = String::new();

    section.push_str("## Share by Year and Category\n\n");

    let breakdown = match shares {
        Analysis::Available(breakdown) => breakdown,
        Analysis::Unavailable { reason } => {
            section.push_str(&unavailable_note(reason));
            return section;
        }
    };

    if breakdown.subset.is_empty() {
        section.push_str(&format!("All observed values of `{}`.\n\n", breakdown.field));
    } else {
        section.push_str(&format!(
            "Selected values of `{}`: {}.\n\n",
            breakdown.field,
            breakdown.subset.join(", ")
        ));
    }

    section.push_str("| Year | Category | Incidents | Share |\n");
    section.push_str("|:---|:---|---:|---:|\n");

    let limit = if max_rows == 0 {
        breakdown.shares.len()
    } else {
        max_rows
    };
    for share in breakdown.shares.iter().take(limit) {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1}% |\n",
            share.year,
            share.category,
            share.count,
            share.share * 100.0
        ));
    }
    section.push('\n');

    if breakdown.shares.len() > limit {
        section.push_str(&format!(
            "*Showing {} of {} rows; the JSON report has all of them.*\n\n",
            limit,
            breakdown.shares.len()
        ));
    }

    section.push_str(&format!(
        "*Excluded: {} rows without a usable date, {} dated rows without a value.*\n\n",
        breakdown.undated, breakdown.missing_field
    ));

    section
}

/// Generate the data quality section.
fn generate_data_quality_section(quality: &DataQuality) -> String {
    let mut section = String::new();

    section.push_str("## Data Quality\n\n");
    section.push_str("| Check | Rows |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Total rows | {} |\n", quality.total_rows));
    section.push_str(&format!(
        "| Unreadable records (skipped) | {} |\n",
        quality.unreadable_rows
    ));
    section.push_str(&format!("| Missing date | {} |\n", quality.missing_dates));
    section.push_str(&format!("| Unparseable date | {} |\n", quality.malformed_dates));
    for (field, missing) in &quality.missing_by_field {
        section.push_str(&format!("| Missing `{}` | {} |\n", field, missing));
    }
    section.push('\n');

    if !quality.year_gaps.is_empty() {
        section.push_str(&format!(
            "Years with no incidents: {}.\n\n",
            join_years(&quality.year_gaps)
        ));
    }

    section
}

/// Generate the assumptions section.
fn generate_assumptions_section(assumptions: &[String]) -> String {
    if assumptions.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Assumptions\n\n");
    for note in assumptions {
        section.push_str(&format!("- {}\n", note));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by biastrend v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn unavailable_note(reason: &str) -> String {
    format!("*Unavailable: {}*\n\n", reason)
}

fn format_p_value(p: f64) -> String {
    if p < 0.001 {
        "< 0.001".to_string()
    } else {
        format!("= {:.3}", p)
    }
}

fn join_years(years: &[i32]) -> String {
    years
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
