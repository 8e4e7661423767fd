//! In-memory observation table and pivoted views.
//!
//! Tables are explicit row sequences with a fixed schema. Grouping and
//! pivoting walk those rows and reduce into ordered maps; nothing relies
//! on implicit alignment by label.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Days between 0001-01-01 (CE) and the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Column type in a [`ObservationTable`] schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    Text,
    Int32,
}

/// Death count measured per observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Covid,
    Total,
    NonCovid,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Total, Metric::Covid, Metric::NonCovid];

    pub fn column_name(self) -> &'static str {
        match self {
            Metric::Covid => "death_covid",
            Metric::Total => "death_total",
            Metric::NonCovid => "death_non_covid",
        }
    }

    pub fn value(self, obs: &Observation) -> i32 {
        match self {
            Metric::Covid => obs.death_covid,
            Metric::Total => obs.death_total,
            Metric::NonCovid => obs.death_non_covid,
        }
    }
}

/// A source row after column normalization, before cleaning.
///
/// Counts are `None` when the cell was blank or the source has no such
/// column (the 2014-2018 file carries no COVID count).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub location: String,
    pub death_total: Option<i64>,
    pub death_covid: Option<i64>,
}

/// One cleaned week-ending observation for a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub location: String,
    pub death_total: i32,
    pub death_covid: i32,
    /// `death_total - death_covid`, never clamped.
    pub death_non_covid: i32,
}

/// Ordered sequence of cleaned observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub const SCHEMA: [(&'static str, ColumnType); 5] = [
        ("date", ColumnType::Date),
        ("location", ColumnType::Text),
        ("death_total", ColumnType::Int32),
        ("death_covid", ColumnType::Int32),
        ("death_non_covid", ColumnType::Int32),
    ];

    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for `location` whose date satisfies `keep`, in table order.
    pub fn select<'a>(
        &'a self,
        location: &'a str,
        keep: impl Fn(NaiveDate) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Observation> + 'a {
        self.rows
            .iter()
            .filter(move |obs| obs.location == location && keep(obs.date))
    }

    /// Convert to a polars frame following [`Self::SCHEMA`].
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let days: Vec<i32> = self.rows.iter().map(|o| days_since_epoch(o.date)).collect();
        let locations: Vec<&str> = self.rows.iter().map(|o| o.location.as_str()).collect();
        let mut columns = vec![
            Column::new("date".into(), days).cast(&DataType::Date)?,
            Column::new("location".into(), locations),
        ];
        for metric in Metric::ALL {
            let values: Vec<i32> = self.rows.iter().map(|o| metric.value(o)).collect();
            columns.push(Column::new(metric.column_name().into(), values));
        }
        DataFrame::new(columns)
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Matrix of summed death counts keyed by (date row, location column).
///
/// Every (date, location) pair on the axes has a value; pairs absent from
/// the source hold 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    metric: Metric,
    dates: Vec<NaiveDate>,
    locations: Vec<String>,
    cells: Vec<i64>,
}

impl PivotTable {
    /// Pivot `table` on `metric`, summing rows that share a key.
    pub fn build(table: &ObservationTable, metric: Metric) -> Self {
        let mut sums: BTreeMap<NaiveDate, BTreeMap<&str, i64>> = BTreeMap::new();
        let mut locations: BTreeMap<&str, usize> = BTreeMap::new();

        for obs in table.rows() {
            *sums
                .entry(obs.date)
                .or_default()
                .entry(obs.location.as_str())
                .or_default() += i64::from(metric.value(obs));
            locations.insert(obs.location.as_str(), 0);
        }

        for (position, index) in locations.values_mut().enumerate() {
            *index = position;
        }

        let width = locations.len();
        let mut cells = vec![0i64; sums.len() * width];
        for (row, by_location) in sums.values().enumerate() {
            for (location, value) in by_location {
                cells[row * width + locations[location]] = *value;
            }
        }

        Self {
            metric,
            dates: sums.keys().copied().collect(),
            locations: locations.keys().map(|s| s.to_string()).collect(),
            cells,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    fn location_index(&self, location: &str) -> Option<usize> {
        self.locations
            .binary_search_by(|l| l.as_str().cmp(location))
            .ok()
    }

    /// Cell value, or `None` when the date or location is not on an axis.
    pub fn get(&self, date: NaiveDate, location: &str) -> Option<i64> {
        let row = self.date_index(date)?;
        let col = self.location_index(location)?;
        Some(self.cells[row * self.locations.len() + col])
    }

    /// All location values for one date, in [`Self::locations`] order.
    pub fn row(&self, date: NaiveDate) -> Option<&[i64]> {
        let row = self.date_index(date)?;
        let width = self.locations.len();
        Some(&self.cells[row * width..(row + 1) * width])
    }

    /// One location's values, in [`Self::dates`] order.
    pub fn column(&self, location: &str) -> Option<Vec<i64>> {
        let col = self.location_index(location)?;
        let width = self.locations.len();
        Some(
            (0..self.dates.len())
                .map(|row| self.cells[row * width + col])
                .collect(),
        )
    }

    /// Sum across locations for one date, skipping `excluded` columns.
    pub fn date_total(&self, date: NaiveDate, excluded: &[String]) -> Option<i64> {
        let row = self.row(date)?;
        Some(
            self.locations
                .iter()
                .zip(row)
                .filter(|(location, _)| !excluded.contains(location))
                .map(|(_, value)| value)
                .sum(),
        )
    }
}

/// The three pivoted views of one observation table.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotViews {
    pub covid: PivotTable,
    pub total: PivotTable,
    pub non_covid: PivotTable,
}

impl PivotViews {
    pub fn get(&self, metric: Metric) -> &PivotTable {
        match metric {
            Metric::Covid => &self.covid,
            Metric::Total => &self.total,
            Metric::NonCovid => &self.non_covid,
        }
    }
}
