//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.biastrend.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::QuartileMethod;
use crate::models::ShareField;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".biastrend.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input dataset settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "hate_crime_report.md".to_string()
}

/// Input dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Column holding the incident date.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Column holding the bias motivation.
    #[serde(default = "default_bias_column")]
    pub bias_column: String,

    /// Column holding the location type.
    #[serde(default = "default_location_column")]
    pub location_column: String,

    /// Field delimiter (a single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Cell values treated as missing (compared after trimming).
    #[serde(default = "default_null_markers")]
    pub null_markers: Vec<String>,

    /// chrono format strings tried in order when parsing dates.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            date_column: default_date_column(),
            bias_column: default_bias_column(),
            location_column: default_location_column(),
            delimiter: default_delimiter(),
            null_markers: default_null_markers(),
            date_formats: default_date_formats(),
        }
    }
}

fn default_date_column() -> String {
    "incident_date".to_string()
}

fn default_bias_column() -> String {
    "bias_desc".to_string()
}

fn default_location_column() -> String {
    "location_name".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_null_markers() -> Vec<String> {
    vec!["", "NA", "N/A", "null", "NULL", "None"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_date_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d-%b-%y",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of categories kept in each ranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Field used for the year × category shares.
    #[serde(default)]
    pub share_field: ShareField,

    /// Categories to report shares for; empty means all.
    #[serde(default)]
    pub share_categories: Vec<String>,

    /// How quartiles are interpolated.
    #[serde(default)]
    pub quartile_method: QuartileMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            share_field: ShareField::default(),
            share_categories: Vec::new(),
            quartile_method: QuartileMethod::default(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the full per-year count table.
    #[serde(default = "default_true")]
    pub include_yearly_table: bool,

    /// Include the year × category share table.
    #[serde(default = "default_true")]
    pub include_shares: bool,

    /// Maximum rows printed in the share table (0 = no limit).
    #[serde(default = "default_max_share_rows")]
    pub max_share_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_yearly_table: true,
            include_shares: true,
            max_share_rows: default_max_share_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_share_rows() -> usize {
    200
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from `path` if it exists.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(top_k) = args.top_k {
            self.analysis.top_k = top_k;
        }
        if let Some(share_field) = args.share_field {
            self.analysis.share_field = share_field;
        }
        if let Some(ref categories) = args.categories {
            self.analysis.share_categories = categories.clone();
        }
        if let Some(method) = args.quartile_method {
            self.analysis.quartile_method = method;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        if !self.loader.delimiter.is_ascii() {
            anyhow::bail!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.loader.delimiter
            );
        }
        if self.loader.date_formats.is_empty() {
            anyhow::bail!("At least one date format must be configured");
        }
        if self.analysis.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
