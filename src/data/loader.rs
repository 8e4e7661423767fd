//! CSV Data Loader Module
//! Reads the weekly death sources and the population reference table using Polars.

use crate::config::{PopulationConfig, SourceConfig};
use crate::data::table::RawObservation;
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Location name to resident population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    entries: BTreeMap<String, i64>,
}

impl PopulationTable {
    pub fn get(&self, location: &str) -> Option<i64> {
        self.entries.get(location).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build from pairs, rejecting a location listed twice.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (location, population) in pairs {
            let location = location.into();
            if entries.contains_key(&location) {
                return Err(PipelineError::DuplicatePopulation(location));
            }
            entries.insert(location, population);
        }
        Ok(Self { entries })
    }
}

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Read every cell as text; typing is done here so that malformed
    /// cells surface as errors naming their row instead of silently
    /// becoming nulls.
    fn read_text_frame(path: &Path) -> Result<DataFrame> {
        if !path.is_file() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;

        debug!(
            "Read {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    fn text_column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a StringChunked> {
        let column = df.column(name).map_err(|_| PipelineError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })?;
        Ok(column.str()?)
    }

    /// Load one weekly death source, renaming its headers into the
    /// canonical (date, location, death_total, death_covid) shape.
    pub fn load_source(source: &SourceConfig) -> Result<Vec<RawObservation>> {
        let path = source.path.as_path();
        let df = Self::read_text_frame(path)?;

        let dates = Self::text_column(&df, path, &source.date_column)?;
        let locations = Self::text_column(&df, path, &source.location_column)?;
        let totals = Self::text_column(&df, path, &source.total_column)?;
        let covid = match &source.covid_column {
            Some(name) => Some(Self::text_column(&df, path, name)?),
            None => None,
        };

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let invalid = |column: &str, value: Option<&str>| PipelineError::InvalidValue {
                path: path.to_path_buf(),
                row: i + 1,
                column: column.to_string(),
                value: value.unwrap_or_default().to_string(),
            };

            let raw_date = dates.get(i);
            let date = raw_date
                .and_then(parse_date)
                .ok_or_else(|| invalid(&source.date_column, raw_date))?;

            let location = match locations.get(i).map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                other => return Err(invalid(&source.location_column, other)),
            };

            let death_total = parse_count(totals.get(i))
                .map_err(|_| invalid(&source.total_column, totals.get(i)))?;

            let death_covid = match (covid, &source.covid_column) {
                (Some(ca), Some(name)) => {
                    parse_count(ca.get(i)).map_err(|_| invalid(name, ca.get(i)))?
                }
                _ => None,
            };

            rows.push(RawObservation {
                date,
                location,
                death_total,
                death_covid,
            });
        }

        info!("Loaded {} observations from {}", rows.len(), path.display());
        Ok(rows)
    }

    /// Load the location -> population reference table.
    pub fn load_population(config: &PopulationConfig) -> Result<PopulationTable> {
        let path = config.path.as_path();
        let df = Self::read_text_frame(path)?;

        let locations = Self::text_column(&df, path, &config.location_column)?;
        let populations = Self::text_column(&df, path, &config.population_column)?;

        let mut pairs = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let invalid = |column: &str, value: Option<&str>| PipelineError::InvalidValue {
                path: path.to_path_buf(),
                row: i + 1,
                column: column.to_string(),
                value: value.unwrap_or_default().to_string(),
            };

            let location = match locations.get(i).map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                other => return Err(invalid(&config.location_column, other)),
            };
            let population = parse_count(populations.get(i))
                .ok()
                .flatten()
                .ok_or_else(|| invalid(&config.population_column, populations.get(i)))?;

            pairs.push((location, population));
        }

        let table = PopulationTable::from_pairs(pairs)?;
        info!("Loaded population for {} locations", table.len());
        Ok(table)
    }
}

/// Parse a week-ending date in ISO or US notation.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Parse a death or population count. Blank cells are `Ok(None)`.
///
/// Thousands separators are accepted. Negative values, and values with a
/// fractional part, are rejected rather than clamped or truncated.
pub(crate) fn parse_count(value: Option<&str>) -> std::result::Result<Option<i64>, ()> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    let count = match cleaned.parse::<i64>() {
        Ok(n) => n,
        Err(_) => match cleaned.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(()),
        },
    };

    if count < 0 {
        return Err(());
    }
    Ok(Some(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn recent_source(path: &Path) -> SourceConfig {
        SourceConfig {
            path: path.to_path_buf(),
            date_column: "Week Ending Date".into(),
            location_column: "Jurisdiction of Occurrence".into(),
            total_column: "All Cause".into(),
            covid_column: Some("COVID-19 (U071, Multiple Cause of Death)".into()),
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 4);
        assert_eq!(parse_date("2020-01-04"), expected);
        assert_eq!(parse_date("01/04/2020"), expected);
        assert_eq!(parse_date("4 Jan 2020"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(Some("1,234")), Ok(Some(1234)));
        assert_eq!(parse_count(Some(" 12 ")), Ok(Some(12)));
        assert_eq!(parse_count(Some("12.0")), Ok(Some(12)));
        assert_eq!(parse_count(Some("")), Ok(None));
        assert_eq!(parse_count(None), Ok(None));
        assert_eq!(parse_count(Some("12.5")), Err(()));
        assert_eq!(parse_count(Some("n/a")), Err(()));
        assert_eq!(parse_count(Some("0")), Ok(Some(0)));
        assert_eq!(parse_count(Some("-5")), Err(()));
        assert_eq!(parse_count(Some("-9223372036854775808")), Err(()));
        assert_eq!(parse_count(Some("-3.0")), Err(()));
    }

    #[test]
    fn test_load_source_rejects_negative_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.csv");
        fs::write(
            &path,
            "Jurisdiction of Occurrence,Week Ending Date,All Cause,\"COVID-19 (U071, Multiple Cause of Death)\"\n\
             Ohio,2020-01-04,-9223372036854775808,1\n",
        )
        .unwrap();

        let err = DataLoader::load_source(&recent_source(&path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataFormat);
        assert!(matches!(
            err,
            PipelineError::InvalidValue { row: 1, ref column, .. } if column == "All Cause"
        ));
    }

    #[test]
    fn test_load_source_renames_and_fills() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.csv");
        fs::write(
            &path,
            "Jurisdiction of Occurrence,Week Ending Date,All Cause,\"COVID-19 (U071, Multiple Cause of Death)\",Other\n\
             Ohio,2020-01-04,120,20,x\n\
             Texas,01/11/2020,\"3,000\",,y\n",
        )
        .unwrap();

        let rows = DataLoader::load_source(&recent_source(&path)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location, "Ohio");
        assert_eq!(rows[0].death_total, Some(120));
        assert_eq!(rows[0].death_covid, Some(20));
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2020, 1, 11).unwrap());
        assert_eq!(rows[1].death_total, Some(3000));
        assert_eq!(rows[1].death_covid, None);
    }

    #[test]
    fn test_load_source_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.csv");
        fs::write(
            &path,
            "Jurisdiction of Occurrence,Week Ending Date,All Cause\nOhio,2020-01-04,1\n",
        )
        .unwrap();

        let err = DataLoader::load_source(&recent_source(&path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataFormat);
        assert!(err.to_string().contains("COVID-19"));
    }

    #[test]
    fn test_load_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let err =
            DataLoader::load_source(&recent_source(&dir.path().join("nope.csv"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_load_source_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.csv");
        fs::write(
            &path,
            "Jurisdiction of Occurrence,Week Ending Date,All Cause,\"COVID-19 (U071, Multiple Cause of Death)\"\n",
        )
        .unwrap();

        let rows = DataLoader::load_source(&recent_source(&path)).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_load_population_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("population.csv");
        fs::write(&path, "location,population\nOhio,100\nOhio,200\n").unwrap();

        let config = PopulationConfig {
            path,
            location_column: "location".into(),
            population_column: "population".into(),
        };
        let err = DataLoader::load_population(&config).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicatePopulation(ref l) if l == "Ohio"));
    }

    #[test]
    fn test_load_population() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("population.csv");
        fs::write(&path, "location,population\nOhio,\"11,689,100\"\nTexas,28995881\n").unwrap();

        let config = PopulationConfig {
            path,
            location_column: "location".into(),
            population_column: "population".into(),
        };
        let table = DataLoader::load_population(&config).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Ohio"), Some(11_689_100));
        assert_eq!(table.get("Utah"), None);
    }
}
