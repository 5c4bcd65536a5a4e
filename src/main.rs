//! BiasTrend - exploratory statistics for hate-crime incident data
//!
//! A CLI tool that loads a CSV of reported incidents and produces
//! yearly counts, descriptive statistics, a linear trend fit, ranked
//! bias motivations and locations, and per-year category shares.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, unreadable dataset, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use models::{Field, IncidentTable};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration; it can raise the log level
    let config = match resolve_config(&args, Path::new(config::DEFAULT_CONFIG_FILE)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("BiasTrend v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run_analysis(args, config) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .biastrend.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .biastrend.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .biastrend.toml")?;

    println!("✅ Created .biastrend.toml with default settings.");
    println!("   Edit it to customize column names, null markers, date formats, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete pipeline: load, analyze, report.
fn run_analysis(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let input = args.input_path();

    // Step 1: Load the dataset
    if !args.quiet {
        println!("📥 Loading dataset: {}", input.display());
    }
    let mut load_options = loader::LoadOptions::from(&config.loader);
    load_options.show_progress = !args.quiet;

    let table = loader::load_incidents(&input, &load_options)?;
    if table.is_empty() {
        warn!("Dataset {} has no rows; every analysis will be unavailable", input.display());
    }

    // Handle --dry-run: describe the table and exit
    if args.dry_run {
        handle_dry_run(&table);
        return Ok(());
    }

    // Step 2: Aggregate, summarize, model
    if !args.quiet {
        println!("🔬 Analyzing {} incidents...", table.len());
    }
    let options = analysis::AnalysisOptions::from(&config.analysis);
    let results = analysis::analyze(&table, &options);

    // Step 3: Build and write the report
    let duration = start_time.elapsed().as_secs_f64();
    let report = report::build_report(&input, results, duration);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        print_summary(&report);
        println!(
            "\n✅ Analysis complete! Report saved to: {}",
            output_path.display()
        );
    }

    Ok(())
}

/// Print the headline numbers to the terminal.
fn print_summary(report: &models::Report) {
    let results = &report.results;

    println!("\n📊 Analysis Summary:");
    println!("   Rows: {}", results.total_rows);
    if let Some((first, last)) = report.metadata.year_range {
        println!("   Years: {}–{}", first, last);
    }
    if let Some(summary) = results.summary.as_available() {
        println!(
            "   Per year: mean {:.0} | median {:.0} | SD {:.0}",
            summary.mean, summary.median, summary.standard_deviation
        );
    }
    if let Some(trend) = results.trend.as_available() {
        println!(
            "   Trend: {:+.1}/year (R² {:.2}, p {:.4})",
            trend.slope, trend.r_squared, trend.p_value_for_slope
        );
    }
    let excluded = results.yearly_counts.excluded();
    if excluded > 0 {
        println!("   Rows without a usable date: {}", excluded);
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
}

/// Handle --dry-run: print what was loaded, no analysis.
fn handle_dry_run(table: &IncidentTable) {
    println!("\n🔍 Dry run: dataset loaded, no analysis performed.\n");
    println!("   Rows: {}", table.len());
    println!("   Unreadable records: {}", table.unreadable_rows);
    let (missing_dates, malformed_dates) = table.date_problems();
    println!("   Rows without a date: {}", missing_dates);
    println!("   Rows with a malformed date: {}", malformed_dates);
    for field in [Field::Bias, Field::Location] {
        println!("   Missing {}: {}", field, table.missing_count(&field));
    }
    if !table.extra_columns.is_empty() {
        println!("   Other columns: {}", table.extra_columns.join(", "));
    }
    println!("\n✅ Dry run complete.");
}

/// Load configuration, apply CLI overrides and validate the result.
///
/// `--config` must name a readable file. Otherwise `default_path` is used
/// when it exists, and built-in defaults when it does not. A config file
/// that exists but cannot be parsed is an error.
fn resolve_config(args: &Args, default_path: &Path) -> Result<Config> {
    let mut config = match args.config {
        Some(ref config_path) => Config::load(config_path)?,
        None => Config::load_optional(default_path)
            .with_context(|| format!("Failed to load {}", default_path.display()))?
            .unwrap_or_default(),
    };

    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}
