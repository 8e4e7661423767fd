//! Configuration file handling.
//!
//! Settings come from `.mortality-pivot.toml` (or `--config FILE`); every
//! section has defaults reproducing the published analysis, and command
//! line arguments override what the file says.

use crate::cli::Args;
use crate::stats::{DateWindow, Exclusion};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".mortality-pivot.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub population: PopulationConfig,

    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[serde(default)]
    pub charts: ChartsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// The two weekly death sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_historical")]
    pub historical: SourceConfig,

    #[serde(default = "default_recent")]
    pub recent: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            historical: default_historical(),
            recent: default_recent(),
        }
    }
}

/// Location of one CSV source and the headers that map onto the
/// canonical columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub date_column: String,
    pub location_column: String,
    pub total_column: String,
    /// Absent for sources predating COVID-19 reporting.
    #[serde(default)]
    pub covid_column: Option<String>,
}

fn default_historical() -> SourceConfig {
    SourceConfig {
        path: PathBuf::from("Weekly_Counts_of_Deaths_by_State_and_Select_Causes__2014-2018.csv"),
        date_column: "Week Ending Date".to_string(),
        location_column: "Jurisdiction of Occurrence".to_string(),
        // The 2014-2018 export really has two spaces here.
        total_column: "All  Cause".to_string(),
        covid_column: None,
    }
}

fn default_recent() -> SourceConfig {
    SourceConfig {
        path: PathBuf::from("Weekly_Counts_of_Deaths_by_State_and_Select_Causes__2019-2020.csv"),
        date_column: "Week Ending Date".to_string(),
        location_column: "Jurisdiction of Occurrence".to_string(),
        total_column: "All Cause".to_string(),
        covid_column: Some("COVID-19 (U071, Multiple Cause of Death)".to_string()),
    }
}

/// Population reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    #[serde(default = "default_population_path")]
    pub path: PathBuf,

    #[serde(default = "default_population_location")]
    pub location_column: String,

    #[serde(default = "default_population_column")]
    pub population_column: String,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            path: default_population_path(),
            location_column: default_population_location(),
            population_column: default_population_column(),
        }
    }
}

fn default_population_path() -> PathBuf {
    PathBuf::from("population.csv")
}

fn default_population_location() -> String {
    "location".to_string()
}

fn default_population_column() -> String {
    "population".to_string()
}

/// Aggregation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Label of the national aggregate row, excluded from per-location rankings.
    #[serde(default = "default_national_label")]
    pub national_label: String,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// First rank index folded into the "Others" bucket.
    #[serde(default = "default_others_from")]
    pub others_from: usize,

    /// Location merged into `consolidate_into` before ranking.
    #[serde(default = "default_consolidate_from")]
    pub consolidate_from: String,

    #[serde(default = "default_consolidate_into")]
    pub consolidate_into: String,

    /// Baseline window start (inclusive).
    #[serde(default = "default_baseline_start")]
    pub baseline_start: NaiveDate,

    /// Baseline window end (exclusive).
    #[serde(default = "default_baseline_end")]
    pub baseline_end: NaiveDate,

    /// Target window covers dates strictly after this one.
    #[serde(default = "default_target_after")]
    pub target_after: NaiveDate,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            national_label: default_national_label(),
            top_n: default_top_n(),
            others_from: default_others_from(),
            consolidate_from: default_consolidate_from(),
            consolidate_into: default_consolidate_into(),
            baseline_start: default_baseline_start(),
            baseline_end: default_baseline_end(),
            target_after: default_target_after(),
        }
    }
}

impl AggregateConfig {
    pub fn exclusion(&self) -> Exclusion {
        Exclusion::of([self.national_label.as_str()])
    }

    pub fn baseline_window(&self) -> DateWindow {
        DateWindow::between(self.baseline_start, self.baseline_end)
    }

    pub fn target_window(&self) -> DateWindow {
        DateWindow::after(self.target_after)
    }
}

fn default_national_label() -> String {
    "United States".to_string()
}

fn default_top_n() -> usize {
    5
}

fn default_others_from() -> usize {
    6
}

fn default_consolidate_from() -> String {
    "New York City".to_string()
}

fn default_consolidate_into() -> String {
    "New York".to_string()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn default_baseline_start() -> NaiveDate {
    ymd(2014, 1, 1)
}

fn default_baseline_end() -> NaiveDate {
    ymd(2019, 12, 31)
}

fn default_target_after() -> NaiveDate {
    ymd(2020, 1, 1)
}

/// Chart output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_charts_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Nationwide scatter covers dates strictly after this one.
    #[serde(default = "default_target_after")]
    pub scatter_after: NaiveDate,

    #[serde(default = "default_timelines")]
    pub timelines: Vec<TimelineConfig>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_charts_dir(),
            width: default_width(),
            height: default_height(),
            scatter_after: default_target_after(),
            timelines: default_timelines(),
        }
    }
}

/// One multi-series line chart over a group of locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    pub title: String,
    pub locations: Vec<String>,
    /// Dates strictly after this one are plotted.
    pub after: NaiveDate,
}

fn default_true() -> bool {
    true
}

fn default_charts_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_width() -> u32 {
    1600
}

fn default_height() -> u32 {
    600
}

fn default_timelines() -> Vec<TimelineConfig> {
    vec![
        TimelineConfig {
            title: "New York State Death Data 2019-2020".to_string(),
            locations: vec!["New York".to_string(), "New York City".to_string()],
            after: ymd(2019, 1, 1),
        },
        TimelineConfig {
            title: "California State Death Data 2019-2020".to_string(),
            locations: vec!["California".to_string()],
            after: ymd(2019, 1, 1),
        },
    ]
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_container")]
    pub container: PathBuf,

    /// Replace an existing container instead of failing.
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            overwrite: false,
        }
    }
}

fn default_container() -> PathBuf {
    PathBuf::from("death_data.zip")
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

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only arguments the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref path) = args.historical {
            self.sources.historical.path = path.clone();
        }
        if let Some(ref path) = args.recent {
            self.sources.recent.path = path.clone();
        }
        if let Some(ref path) = args.population {
            self.population.path = path.clone();
        }
        if let Some(ref path) = args.output {
            self.output.container = path.clone();
        }
        if let Some(ref dir) = args.charts_dir {
            self.charts.directory = dir.clone();
        }
        if args.no_charts {
            self.charts.enabled = false;
        }
        if args.overwrite {
            self.output.overwrite = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let aggregate = &self.aggregate;
        if aggregate.top_n == 0 {
            anyhow::bail!("aggregate.top_n must be at least 1");
        }
        if aggregate.others_from < aggregate.top_n {
            anyhow::bail!(
                "aggregate.others_from ({}) must not be below top_n ({})",
                aggregate.others_from,
                aggregate.top_n
            );
        }
        if aggregate.baseline_start >= aggregate.baseline_end {
            anyhow::bail!(
                "aggregate.baseline_start ({}) must precede baseline_end ({})",
                aggregate.baseline_start,
                aggregate.baseline_end
            );
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            anyhow::bail!("charts.width and charts.height must be positive");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
