//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

use crate::analysis::QuartileMethod;
use crate::models::ShareField;

/// BiasTrend - exploratory statistics for hate-crime incident data
///
/// Loads a CSV of reported incidents and reports yearly counts,
/// descriptive statistics, a linear trend fit, top bias motivations
/// and locations, and per-year category shares.
///
/// Examples:
///   biastrend --input hate_crime.csv
///   biastrend --input hate_crime.csv --format json --output report.json
///   biastrend --input hate_crime.csv --share-field location --top-k 5
///   biastrend --input hate_crime.csv --dry-run
///   biastrend --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV file of incidents to analyze
    ///
    /// Must contain a header row with the date, bias and location columns
    /// named in the configuration.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "BIASTREND_INPUT",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting (hate_crime_report.md).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .biastrend.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Number of categories in each top-k ranking
    #[arg(short = 'k', long, value_name = "COUNT")]
    pub top_k: Option<usize>,

    /// Field used for the per-year share breakdown
    #[arg(long, value_name = "FIELD")]
    pub share_field: Option<ShareField>,

    /// Categories to include in the share breakdown (comma-separated)
    ///
    /// Example: --categories "Anti-Jewish,Anti-Gay (Male)"
    #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Quartile interpolation method (linear, exclusive)
    #[arg(long, value_name = "METHOD")]
    pub quartile_method: Option<QuartileMethod>,

    /// Dry run: load the dataset and print row counts without analysing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .biastrend.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the input path (should be validated first).
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_default()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            None => return Err("An input file is required (--input)".to_string()),
            Some(ref path) if path.is_dir() => {
                return Err(format!("Input path is a directory: {}", path.display()));
            }
            Some(_) => {}
        }

        if self.top_k == Some(0) {
            return Err("Top-k must be at least 1".to_string());
        }

        if let Some(ref categories) = self.categories {
            if categories.iter().any(|c| c.trim().is_empty()) {
                return Err("Category names must not be empty".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` wins over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
