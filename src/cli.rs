//! Command-line interface argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Weekly US mortality analysis
///
/// Loads the 2014-2018 and 2019-2020 weekly death counts, splits COVID
/// from non-COVID deaths, renders the summary charts and stores the
/// summary tables in a single container file.
///
/// Examples:
///   mortality-pivot
///   mortality-pivot --historical deaths_14_18.csv --recent deaths_19_20.csv
///   mortality-pivot --population population.csv --output tables.zip --overwrite
///   mortality-pivot --no-charts --json
///   mortality-pivot --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .mortality-pivot.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Weekly deaths CSV for 2014-2018
    #[arg(long, value_name = "FILE")]
    pub historical: Option<PathBuf>,

    /// Weekly deaths CSV for 2019-2020
    #[arg(long, value_name = "FILE")]
    pub recent: Option<PathBuf>,

    /// Population reference CSV (location, population)
    #[arg(long, value_name = "FILE", env = "MORTALITY_POPULATION")]
    pub population: Option<PathBuf>,

    /// Container file for the summary tables
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for rendered charts
    #[arg(long, value_name = "DIR")]
    pub charts_dir: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Replace an existing container file
    #[arg(long)]
    pub overwrite: bool,

    /// Print the summary tables as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .mortality-pivot.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref config) = self.config {
            if !config.is_file() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::WARN
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("mortality-pivot").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(args.historical.is_none());
        assert!(!args.no_charts);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_paths() {
        let args = parse(&["--historical", "a.csv", "--recent", "b.csv", "-o", "out.zip"]);
        assert_eq!(args.historical, Some(PathBuf::from("a.csv")));
        assert_eq!(args.recent, Some(PathBuf::from("b.csv")));
        assert_eq!(args.output, Some(PathBuf::from("out.zip")));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_config() {
        let args = parse(&["--config", "/definitely/not/here.toml"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&[]).log_level(), tracing::Level::INFO);
        assert_eq!(parse(&["-v"]).log_level(), tracing::Level::DEBUG);
        assert_eq!(parse(&["-q"]).log_level(), tracing::Level::WARN);
    }
}
