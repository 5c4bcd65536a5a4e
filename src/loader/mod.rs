//! CSV loader for incident datasets.
//!
//! Reads a delimited file with a header row into an [`IncidentTable`].
//! Missing values are kept as `None`; nothing is dropped at load time
//! except records the CSV reader cannot decode, which are counted.

use chrono::{NaiveDate, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::models::{Incident, IncidentDate, IncidentTable};

/// How often the spinner message is refreshed, in rows.
const PROGRESS_INTERVAL: usize = 10_000;

/// Options controlling how the dataset is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub date_column: String,
    pub bias_column: String,
    pub location_column: String,
    pub delimiter: u8,
    /// Values treated as missing after trimming. Empty cells are always missing.
    pub null_markers: Vec<String>,
    /// chrono format strings tried in order.
    pub date_formats: Vec<String>,
    /// Show a spinner while reading.
    pub show_progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&crate::config::LoaderConfig::default())
    }
}

impl From<&crate::config::LoaderConfig> for LoadOptions {
    fn from(config: &crate::config::LoaderConfig) -> Self {
        Self {
            date_column: config.date_column.clone(),
            bias_column: config.bias_column.clone(),
            location_column: config.location_column.clone(),
            // Validated as ASCII when the config is loaded
            delimiter: u8::try_from(config.delimiter).unwrap_or(b','),
            null_markers: config.null_markers.clone(),
            date_formats: config.date_formats.clone(),
            show_progress: false,
        }
    }
}

/// Positions of the required columns within a header row.
#[derive(Debug)]
struct ColumnLayout {
    date: usize,
    bias: usize,
    location: usize,
    /// (record index, header name) for every other column.
    extra: Vec<(usize, String)>,
}

impl ColumnLayout {
    /// Resolve the layout, or return the name of the first missing column.
    fn resolve(headers: &csv::StringRecord, options: &LoadOptions) -> Result<Self, String> {
        let names: Vec<&str> = headers.iter().map(str::trim).collect();
        let find = |wanted: &str| {
            names
                .iter()
                .position(|name| *name == wanted)
                .ok_or_else(|| wanted.to_string())
        };

        let date = find(options.date_column.as_str())?;
        let bias = find(options.bias_column.as_str())?;
        let location = find(options.location_column.as_str())?;

        let extra = names
            .iter()
            .enumerate()
            .filter(|(idx, _)| ![date, bias, location].contains(idx))
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        Ok(Self {
            date,
            bias,
            location,
            extra,
        })
    }

    fn incident(&self, record: &csv::StringRecord, options: &LoadOptions) -> Incident {
        let cell = |idx: usize| normalize_cell(record.get(idx), &options.null_markers);

        Incident {
            incident_date: cell(self.date).map(|raw| parse_date(&raw, &options.date_formats)),
            bias_desc: cell(self.bias),
            location_name: cell(self.location),
            extra: self.extra.iter().map(|(idx, _)| cell(*idx)).collect(),
        }
    }
}

/// Load the incident table from a CSV file.
///
/// Fails with [`AnalysisError::DataUnavailable`] when the file cannot be
/// opened or read, or a required column is absent. The file handle is
/// owned by the reader and closed when this function returns.
pub fn load_incidents(path: &Path, options: &LoadOptions) -> Result<IncidentTable, AnalysisError> {
    info!("Loading incidents from {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AnalysisError::unavailable(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::unavailable(path, e))?
        .clone();

    let layout = ColumnLayout::resolve(&headers, options).map_err(|missing| {
        AnalysisError::unavailable(path, format!("missing required column '{}'", missing))
    })?;
    debug!(
        "Column layout: date={} bias={} location={} extra={}",
        layout.date,
        layout.bias,
        layout.location,
        layout.extra.len()
    );

    let progress = options.show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Reading rows...");
        pb
    });

    let mut incidents = Vec::new();
    let mut unreadable_rows = 0;
    let mut record = csv::StringRecord::new();

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {
                incidents.push(layout.incident(&record, options));
                if let Some(ref pb) = progress {
                    if incidents.len() % PROGRESS_INTERVAL == 0 {
                        pb.set_message(format!("Read {} rows", incidents.len()));
                    }
                }
            }
            Ok(false) => break,
            Err(e) if e.is_io_error() => {
                if let Some(ref pb) = progress {
                    pb.abandon_with_message("Read failed");
                }
                return Err(AnalysisError::unavailable(path, e));
            }
            Err(e) => {
                unreadable_rows += 1;
                warn!("Skipping unreadable record: {}", e);
            }
        }
    }

    if let Some(ref pb) = progress {
        pb.finish_and_clear();
    }

    info!(
        "Loaded {} rows ({} unreadable, {} extra columns)",
        incidents.len(),
        unreadable_rows,
        layout.extra.len()
    );

    let extra_columns = layout.extra.into_iter().map(|(_, name)| name).collect();
    let mut table = IncidentTable::new(path.to_path_buf(), extra_columns, incidents);
    table.unreadable_rows = unreadable_rows;
    Ok(table)
}

/// Trim a cell and map null markers to `None`.
fn normalize_cell(raw: Option<&str>, null_markers: &[String]) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || null_markers.iter().any(|m| m == value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a date with each format in turn.
///
/// Falls back to the leading `YYYY-MM-DD` of longer timestamps.
pub fn parse_date(raw: &str, formats: &[String]) -> IncidentDate {
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return IncidentDate::Parsed(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return IncidentDate::Parsed(datetime.date());
        }
    }

    if let Some(date) = raw
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    {
        return IncidentDate::Parsed(date);
    }

    IncidentDate::Malformed(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        write_csv_bytes(content.as_bytes())
    }

    fn write_csv_bytes(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn default_formats() -> Vec<String> {
        LoadOptions::default().date_formats
    }

    #[test]
    fn test_parse_date_formats() {
        let formats = default_formats();
        let expected = NaiveDate::from_ymd_opt(1991, 7, 4).unwrap();

        assert_eq!(parse_date("1991-07-04", &formats), IncidentDate::Parsed(expected));
        assert_eq!(parse_date("07/04/1991", &formats), IncidentDate::Parsed(expected));
        assert_eq!(parse_date("04-JUL-91", &formats), IncidentDate::Parsed(expected));
        assert_eq!(
            parse_date("1991-07-04 13:45:00", &formats),
            IncidentDate::Parsed(expected)
        );
        assert_eq!(
            parse_date("1991-07-04T00:00:00.000Z", &formats),
            IncidentDate::Parsed(expected)
        );
    }

    #[test]
    fn test_parse_date_malformed() {
        let formats = default_formats();
        assert_eq!(
            parse_date("sometime in 1991", &formats),
            IncidentDate::Malformed("sometime in 1991".to_string())
        );
        assert!(matches!(
            parse_date("1991-13-45", &formats),
            IncidentDate::Malformed(_)
        ));
    }

    #[test]
    fn test_normalize_cell() {
        let markers = vec!["NA".to_string(), "null".to_string()];
        assert_eq!(normalize_cell(Some("  Anti-Jewish "), &markers), Some("Anti-Jewish".to_string()));
        assert_eq!(normalize_cell(Some("NA"), &markers), None);
        assert_eq!(normalize_cell(Some(" null "), &markers), None);
        assert_eq!(normalize_cell(Some("   "), &markers), None);
        assert_eq!(normalize_cell(None, &markers), None);
    }

    #[test]
    fn test_load_preserves_missing_values() {
        let file = write_csv(
            "incident_id,incident_date,bias_desc,location_name,offense_name\n\
             1,1991-01-05,Anti-Black or African American,Residence/Home,Intimidation\n\
             2,,Anti-Jewish,NA,Destruction/Damage/Vandalism of Property\n\
             3,not a date,,Highway/Road/Alley/Street/Sidewalk,\n",
        );

        let table = load_incidents(file.path(), &LoadOptions::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.extra_columns, vec!["incident_id", "offense_name"]);
        assert_eq!(table.unreadable_rows, 0);

        let first = &table.incidents[0];
        assert_eq!(first.year(), Some(1991));
        assert_eq!(first.bias_desc.as_deref(), Some("Anti-Black or African American"));
        assert_eq!(first.extra[1].as_deref(), Some("Intimidation"));

        let second = &table.incidents[1];
        assert_eq!(second.incident_date, None);
        assert_eq!(second.location_name, None);

        let third = &table.incidents[2];
        assert_eq!(
            third.incident_date,
            Some(IncidentDate::Malformed("not a date".to_string()))
        );
        assert_eq!(third.bias_desc, None);
        assert_eq!(third.extra[1], None);
    }

    #[test]
    fn test_load_short_records_are_kept() {
        let file = write_csv(
            "incident_date,bias_desc,location_name,state_abbr\n\
             2001-09-12,Anti-Islamic (Muslim)\n",
        );

        let table = load_incidents(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.incidents[0].location_name, None);
        assert_eq!(table.incidents[0].extra, vec![None]);
    }

    #[test]
    fn test_load_counts_undecodable_records() {
        let file = write_csv_bytes(
            b"incident_date,bias_desc,location_name\n\
              1991-01-05,Anti-White,Park/Playground\n\
              1991-02-11,Anti-\xff\xfe,Residence/Home\n\
              1992-03-20,Anti-Asian,Residence/Home\n",
        );

        let table = load_incidents(file.path(), &LoadOptions::default()).unwrap();

        assert_eq!(table.unreadable_rows, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.incidents[0].bias_desc.as_deref(), Some("Anti-White"));
        assert_eq!(table.incidents[1].bias_desc.as_deref(), Some("Anti-Asian"));
        assert_eq!(table.incidents[1].year(), Some(1992));

        let results = crate::analysis::analyze(&table, &crate::analysis::AnalysisOptions::default());
        assert_eq!(results.data_quality.unreadable_rows, 1);
        assert_eq!(results.data_quality.total_rows, 2);
    }

    #[test]
    fn test_load_custom_delimiter_and_columns() {
        let file = write_csv("DATE;BIAS;PLACE\n05/30/2020;Anti-Asian;Park/Playground\n");

        let options = LoadOptions {
            date_column: "DATE".to_string(),
            bias_column: "BIAS".to_string(),
            location_column: "PLACE".to_string(),
            delimiter: b';',
            ..LoadOptions::default()
        };

        let table = load_incidents(file.path(), &options).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.incidents[0].year(), Some(2020));
        assert!(table.extra_columns.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_data_unavailable() {
        let err = load_incidents(
            Path::new("/nonexistent/hate_crime.csv"),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable { .. }));
    }

    #[test]
    fn test_load_missing_column_is_data_unavailable() {
        let file = write_csv("incident_date,bias_desc\n1991-01-01,Anti-White\n");

        let err = load_incidents(file.path(), &LoadOptions::default()).unwrap_err();
        match err {
            AnalysisError::DataUnavailable { reason, .. } => {
                assert!(reason.contains("location_name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_fixture() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_incidents.csv");
        let table = load_incidents(&path, &LoadOptions::default()).unwrap();

        assert_eq!(table.len(), 24);
        assert!(table.extra_columns.contains(&"state_abbr".to_string()));
        let years: Vec<i32> = table.incidents.iter().filter_map(|i| i.year()).collect();
        assert_eq!(years.len(), 21);
        assert!(years.iter().all(|y| (1991..=1995).contains(y)));

        let malformed = table
            .incidents
            .iter()
            .filter(|i| matches!(i.incident_date, Some(IncidentDate::Malformed(_))))
            .count();
        assert_eq!(malformed, 1);
    }
}
