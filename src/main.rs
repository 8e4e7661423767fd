//! Mortality Pivot - weekly US mortality analysis CLI
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments, configuration or data, or a failed write

use anyhow::{Context, Result};
use mortality_pivot::charts::{ChartSink, SvgChartRenderer};
use mortality_pivot::cli::Args;
use mortality_pivot::config::{Config, DEFAULT_CONFIG_FILE};
use mortality_pivot::pipeline::{Analysis, Pipeline};
use std::path::Path;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(log_level(&args, &config))?;

    info!("Mortality Pivot v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args, &config) {
        error!("Run failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: write a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// `general.verbose` in the config file counts as `--verbose` unless
/// `--quiet` was given.
fn log_level(args: &Args, config: &Config) -> Level {
    if config.general.verbose && !args.quiet {
        Level::DEBUG
    } else {
        args.log_level()
    }
}

fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Explicit --config, then the default file if present, then built-in defaults.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &Config) -> Result<()> {
    let pipeline = Pipeline::new(config);

    let mut renderer = if config.charts.enabled {
        Some(
            SvgChartRenderer::new(
                &config.charts.directory,
                config.charts.width,
                config.charts.height,
            )
            .context("Failed to prepare chart directory")?,
        )
    } else {
        None
    };

    let (analysis, container) = pipeline
        .run(renderer.as_mut().map(|r| r as &mut dyn ChartSink))
        .context("Pipeline failed")?;

    let charts: Vec<String> = renderer
        .as_ref()
        .map(|r| r.written().iter().map(|p| p.display().to_string()).collect())
        .unwrap_or_default();

    if args.json {
        let report = analysis.report(container, charts);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&analysis, &container, &charts);
    }
    Ok(())
}

fn print_summary(analysis: &Analysis, container: &Path, charts: &[String]) {
    println!("Observations: {}", analysis.table.len());

    println!("\nCOVID deaths (top locations + Others):");
    for row in &analysis.consolidated_summary.rows {
        println!("  {:<24} {:>10}", row.location, row.deaths);
    }

    println!("\nCOVID death rate:");
    for row in &analysis.death_rates.rows {
        println!("  {:<24} {:>9.4}%", row.location, row.rate_pct);
    }

    println!("\nWeekly average death increase:");
    for row in &analysis.weekly_average.ranked {
        println!(
            "  {:<24} {:>10.1} -> {:>10.1}  x{:.4}",
            row.location, row.baseline_mean, row.target_mean, row.increase_ratio
        );
    }

    if !charts.is_empty() {
        println!("\nCharts:");
        for chart in charts {
            println!("  {}", chart);
        }
    }
    println!("\nTables written to {}", container.display());
}
