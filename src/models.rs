//! Data models for the incident analysis.
//!
//! This module contains the in-memory incident table produced by the
//! loader and every derived result type passed from the analysis stages
//! to the report generator.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::analysis::QuartileMethod;
use crate::error::AnalysisError;

/// Date of an incident as found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentDate {
    /// A calendar date that parsed with one of the configured formats.
    Parsed(NaiveDate),
    /// A non-null value no configured format could parse (raw text kept).
    Malformed(String),
}

impl IncidentDate {
    /// Calendar year, if the date parsed.
    pub fn year(&self) -> Option<i32> {
        match self {
            IncidentDate::Parsed(date) => Some(date.year()),
            IncidentDate::Malformed(_) => None,
        }
    }
}

/// One reported incident (one row of the source table).
///
/// Missing values are `None`; an empty string is never used as a null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub incident_date: Option<IncidentDate>,
    pub bias_desc: Option<String>,
    pub location_name: Option<String>,
    /// Remaining columns, aligned with [`IncidentTable::extra_columns`].
    pub extra: Vec<Option<String>>,
}

impl Incident {
    /// Year of a successfully parsed incident date.
    pub fn year(&self) -> Option<i32> {
        self.incident_date.as_ref().and_then(IncidentDate::year)
    }
}

/// A categorical column that can be grouped on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Bias,
    Location,
    /// Any other column of the source, by header name.
    Column(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Bias => write!(f, "bias_desc"),
            Field::Location => write!(f, "location_name"),
            Field::Column(name) => write!(f, "{}", name),
        }
    }
}

/// Field selectable for the year × category share breakdown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ShareField {
    #[default]
    Bias,
    Location,
}

impl From<ShareField> for Field {
    fn from(field: ShareField) -> Self {
        match field {
            ShareField::Bias => Field::Bias,
            ShareField::Location => Field::Location,
        }
    }
}

/// The immutable in-memory dataset.
#[derive(Debug, Clone)]
pub struct IncidentTable {
    /// Where the rows were read from.
    pub source: PathBuf,
    /// Header names of the columns kept in [`Incident::extra`].
    pub extra_columns: Vec<String>,
    /// Rows in input order.
    pub incidents: Vec<Incident>,
    /// Records the CSV reader could not decode at all.
    pub unreadable_rows: usize,
}

impl IncidentTable {
    pub fn new(source: PathBuf, extra_columns: Vec<String>, incidents: Vec<Incident>) -> Self {
        Self {
            source,
            extra_columns,
            incidents,
            unreadable_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Returns a closure that reads `field` from an incident.
    ///
    /// Unknown column names read as missing for every row.
    pub fn accessor<'a>(&self, field: &Field) -> impl Fn(&'a Incident) -> Option<&'a str> {
        let column = match field {
            Field::Bias => Column::Bias,
            Field::Location => Column::Location,
            Field::Column(name) => match self.extra_columns.iter().position(|c| c == name) {
                Some(idx) => Column::Extra(idx),
                None => Column::Unknown,
            },
        };

        move |incident: &'a Incident| match column {
            Column::Bias => incident.bias_desc.as_deref(),
            Column::Location => incident.location_name.as_deref(),
            Column::Extra(idx) => incident.extra.get(idx).and_then(|v| v.as_deref()),
            Column::Unknown => None,
        }
    }

    /// Number of rows whose `field` is missing.
    pub fn missing_count(&self, field: &Field) -> usize {
        let value = self.accessor(field);
        self.incidents.iter().filter(|&i| value(i).is_none()).count()
    }

    /// Rows with no date and rows whose date could not be parsed, in that order.
    pub fn date_problems(&self) -> (usize, usize) {
        self.incidents
            .iter()
            .fold((0, 0), |(missing, malformed), i| match i.incident_date {
                None => (missing + 1, malformed),
                Some(IncidentDate::Malformed(_)) => (missing, malformed + 1),
                Some(IncidentDate::Parsed(_)) => (missing, malformed),
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Bias,
    Location,
    Extra(usize),
    Unknown,
}

/// Incident count for one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyCount {
    pub year: i32,
    pub count: usize,
}

/// Per-year counts plus the rows that could not be assigned a year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearlyCounts {
    /// One entry per distinct year, ascending.
    pub counts: Vec<YearlyCount>,
    /// Rows with no incident date.
    pub missing_dates: usize,
    /// Rows whose incident date could not be parsed.
    pub malformed_dates: usize,
}

impl YearlyCounts {
    /// Rows excluded from the yearly partition.
    pub fn excluded(&self) -> usize {
        self.missing_dates + self.malformed_dates
    }

    /// Sum of all yearly counts.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    /// Years absent between the first and last observed year.
    pub fn gaps(&self) -> Vec<i32> {
        let (Some(first), Some(last)) = (self.counts.first(), self.counts.last()) else {
            return Vec::new();
        };

        let mut observed = self.counts.iter().map(|c| c.year).peekable();
        let mut gaps = Vec::new();
        for year in first.year..=last.year {
            if observed.peek() == Some(&year) {
                observed.next();
            } else {
                gaps.push(year);
            }
        }
        gaps
    }
}

/// One ranked category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFrequency {
    pub category: String,
    pub count: usize,
    /// 1-based rank.
    pub rank: usize,
}

/// Top-k categories of one field, with the totals needed to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRanking {
    pub field: Field,
    pub entries: Vec<CategoryFrequency>,
    /// Rows with a non-null value for the field.
    pub non_null: usize,
    /// Rows with a null value for the field.
    pub missing: usize,
    /// Distinct categories before truncation.
    pub distinct: usize,
}

impl CategoryRanking {
    /// Fraction of non-null rows covered by an entry.
    pub fn share_of(&self, entry: &CategoryFrequency) -> f64 {
        if self.non_null == 0 {
            return 0.0;
        }
        entry.count as f64 / self.non_null as f64
    }
}

/// Share of one category within one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearCategoryShare {
    pub year: i32,
    pub category: String,
    pub count: usize,
    /// `count` over the year's non-null incidents for the field, in [0, 1].
    pub share: f64,
}

/// Year × category shares plus the rows left out of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareBreakdown {
    pub field: Field,
    /// Categories requested; empty means every observed value.
    pub subset: Vec<String>,
    pub shares: Vec<YearCategoryShare>,
    /// Rows excluded for a missing or malformed date.
    pub undated: usize,
    /// Dated rows excluded because the field is null.
    pub missing_field: usize,
}

impl ShareBreakdown {
    /// Shares for a single year, in emitted order.
    pub fn for_year(&self, year: i32) -> impl Iterator<Item = &YearCategoryShare> {
        self.shares.iter().filter(move |s| s.year == year)
    }
}

/// Ordinary-least-squares fit of yearly count on year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    /// Year the regressor is measured from; `intercept` is the fit there.
    pub base_year: i32,
    /// Change in incidents per year.
    pub slope: f64,
    pub intercept: f64,
    /// Two-sided p-value of the slope t-test, assuming independent errors.
    pub p_value_for_slope: f64,
    pub r_squared: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: usize,
    pub n_years: usize,
    /// Residual lag-1 diagnostic; values well below 2 suggest positive
    /// serial correlation. `None` for a perfect fit.
    pub durbin_watson: Option<f64>,
}

impl TrendFit {
    /// Fitted count for a year.
    pub fn predict(&self, year: i32) -> f64 {
        self.intercept + self.slope * f64::from(year - self.base_year)
    }
}

/// Descriptive statistics of the yearly counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountSummary {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub interquartile_range: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub standard_deviation: f64,
    pub min: usize,
    pub max: usize,
    pub quartile_method: QuartileMethod,
}

/// Outcome of one analysis that may be skipped for lack of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Analysis<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Analysis<T> {
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Analysis::Available(value) => Some(value),
            Analysis::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Analysis::Available(_))
    }
}

impl<T> From<Result<T, AnalysisError>> for Analysis<T> {
    fn from(result: Result<T, AnalysisError>) -> Self {
        match result {
            Ok(value) => Analysis::Available(value),
            Err(e) => Analysis::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

/// Row-level exclusions surfaced alongside the results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub total_rows: usize,
    pub unreadable_rows: usize,
    pub missing_dates: usize,
    pub malformed_dates: usize,
    /// Years with no incidents inside the observed range.
    pub year_gaps: Vec<i32>,
    /// Null counts keyed by column name.
    pub missing_by_field: BTreeMap<String, usize>,
}

/// Everything computed from one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub total_rows: usize,
    pub yearly_counts: YearlyCounts,
    pub summary: Analysis<CountSummary>,
    pub trend: Analysis<TrendFit>,
    pub top_bias: Analysis<CategoryRanking>,
    pub top_locations: Analysis<CategoryRanking>,
    pub shares: Analysis<ShareBreakdown>,
    pub data_quality: DataQuality,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analysed dataset.
    pub source: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    pub rows_loaded: usize,
    /// First and last observed year, if any date parsed.
    pub year_range: Option<(i32, i32)>,
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Narrative paragraphs summarising the findings.
    pub narrative: Vec<String>,
    pub results: AnalysisResults,
    /// Modelling choices a reader needs to interpret the numbers.
    pub assumptions: Vec<String>,
}
