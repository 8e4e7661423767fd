//! Summary Aggregator Module
//! Grouped sums, top-N rankings, death rates and multi-year weekly averages.

use crate::data::{ObservationTable, PopulationTable};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};
use tracing::{debug, info, warn};

/// Label of the bucket aggregating locations past the ranked set.
pub const OTHERS_LABEL: &str = "Others";

/// Locations left out of per-location rankings, typically the national
/// aggregate row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusion {
    locations: Vec<String>,
}

impl Exclusion {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locations: locations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excludes(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }
}

/// A contiguous range of week-ending dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: Bound<NaiveDate>,
    end: Bound<NaiveDate>,
}

impl DateWindow {
    /// `[start, end)`
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Excluded(end),
        }
    }

    /// Every date strictly after `date`.
    pub fn after(date: NaiveDate) -> Self {
        Self {
            start: Bound::Excluded(date),
            end: Bound::Unbounded,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start, self.end).contains(&date)
    }
}

/// Summed deaths for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationTotal {
    pub location: String,
    pub deaths: i64,
}

/// Top-N locations plus the "Others" bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeathSummary {
    pub rows: Vec<LocationTotal>,
    /// Ranks between the top-N and the start of "Others"; counted nowhere.
    pub dropped: Vec<LocationTotal>,
    /// Sum of `rows`, the denominator for percentage labels.
    pub total: i64,
}

impl DeathSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Share of `deaths` in [`Self::total`], as a percentage.
    pub fn percentage(&self, deaths: i64) -> Result<f64> {
        if self.total == 0 {
            return Err(PipelineError::DivisionByZero(
                "death summary total is zero".to_string(),
            ));
        }
        Ok(deaths as f64 / self.total as f64 * 100.0)
    }

    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let locations: Vec<&str> = self.rows.iter().map(|r| r.location.as_str()).collect();
        let deaths: Vec<i64> = self.rows.iter().map(|r| r.deaths).collect();
        DataFrame::new(vec![
            Column::new("location".into(), locations),
            Column::new("death_covid".into(), deaths),
        ])
    }
}

/// COVID deaths relative to resident population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeathRate {
    pub location: String,
    pub deaths: i64,
    pub population: i64,
    pub rate_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeathRateTable {
    pub rows: Vec<DeathRate>,
}

impl DeathRateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let locations: Vec<&str> = self.rows.iter().map(|r| r.location.as_str()).collect();
        let deaths: Vec<i64> = self.rows.iter().map(|r| r.deaths).collect();
        let populations: Vec<i64> = self.rows.iter().map(|r| r.population).collect();
        let rates: Vec<f64> = self.rows.iter().map(|r| r.rate_pct).collect();
        DataFrame::new(vec![
            Column::new("location".into(), locations),
            Column::new("death_covid".into(), deaths),
            Column::new("population".into(), populations),
            Column::new("rate_pct".into(), rates),
        ])
    }
}

/// Mean weekly deaths of one location in the baseline and target windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageIncrease {
    pub location: String,
    pub baseline_mean: f64,
    pub target_mean: f64,
    pub increase_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyAverageReport {
    /// Top-N non-excluded locations by increase ratio.
    pub ranked: Vec<AverageIncrease>,
    /// Excluded locations (the national row), computed for reference only.
    pub excluded: Vec<AverageIncrease>,
}

impl WeeklyAverageReport {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Frame of the ranked rows; excluded rows are not part of it.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let locations: Vec<&str> = self.ranked.iter().map(|r| r.location.as_str()).collect();
        let baseline: Vec<f64> = self.ranked.iter().map(|r| r.baseline_mean).collect();
        let target: Vec<f64> = self.ranked.iter().map(|r| r.target_mean).collect();
        let ratio: Vec<f64> = self.ranked.iter().map(|r| r.increase_ratio).collect();
        DataFrame::new(vec![
            Column::new("location".into(), locations),
            Column::new("baseline_mean".into(), baseline),
            Column::new("target_mean".into(), target),
            Column::new("increase_ratio".into(), ratio),
        ])
    }
}

fn sort_totals_desc(totals: &mut [LocationTotal]) {
    totals.sort_by(|a, b| {
        b.deaths
            .cmp(&a.deaths)
            .then_with(|| a.location.cmp(&b.location))
    });
}

/// Computes the summary tables from a cleaned observation table.
pub struct Aggregator;

impl Aggregator {
    /// Sum `death_covid` per location, largest first.
    pub fn death_sum(table: &ObservationTable, exclusion: &Exclusion) -> Vec<LocationTotal> {
        let mut sums: BTreeMap<&str, i64> = BTreeMap::new();
        for obs in table.rows() {
            if exclusion.excludes(&obs.location) {
                continue;
            }
            *sums.entry(obs.location.as_str()).or_default() += i64::from(obs.death_covid);
        }

        let mut totals: Vec<LocationTotal> = sums
            .into_iter()
            .map(|(location, deaths)| LocationTotal {
                location: location.to_string(),
                deaths,
            })
            .collect();
        sort_totals_desc(&mut totals);
        totals
    }

    /// Fold `from` into `into`, drop `from`, and re-rank.
    pub fn consolidate(totals: Vec<LocationTotal>, from: &str, into: &str) -> Vec<LocationTotal> {
        let moved: i64 = totals
            .iter()
            .filter(|t| t.location == from)
            .map(|t| t.deaths)
            .sum();

        let mut merged: Vec<LocationTotal> =
            totals.into_iter().filter(|t| t.location != from).collect();

        match merged.iter_mut().find(|t| t.location == into) {
            Some(target) => target.deaths += moved,
            None if moved != 0 => merged.push(LocationTotal {
                location: into.to_string(),
                deaths: moved,
            }),
            None => {}
        }

        sort_totals_desc(&mut merged);
        merged
    }

    /// Keep the first `top_n` ranks and sum ranks `others_from..` into
    /// an "Others" row.
    ///
    /// With the defaults (5 and 6) rank index 5 lands in neither part.
    /// Published charts were built this way, so the gap is kept. It is
    /// most likely an off-by-one in how they were produced.
    pub fn top_with_others(
        totals: &[LocationTotal],
        top_n: usize,
        others_from: usize,
    ) -> DeathSummary {
        if totals.is_empty() {
            return DeathSummary::default();
        }

        let top_end = top_n.min(totals.len());
        let others_start = others_from.min(totals.len()).max(top_end);

        let mut rows = totals[..top_end].to_vec();
        let dropped = totals[top_end..others_start].to_vec();
        rows.push(LocationTotal {
            location: OTHERS_LABEL.to_string(),
            deaths: totals[others_start..].iter().map(|t| t.deaths).sum(),
        });
        let total = rows.iter().map(|r| r.deaths).sum();

        if !dropped.is_empty() {
            debug!(
                "Ranks {}..{} not counted in summary: {:?}",
                top_end, others_start, dropped
            );
        }

        DeathSummary {
            rows,
            dropped,
            total,
        }
    }

    /// Top-N COVID deaths by location with an "Others" bucket.
    pub fn covid_death_summary(
        table: &ObservationTable,
        exclusion: &Exclusion,
        top_n: usize,
        others_from: usize,
    ) -> DeathSummary {
        let totals = Self::death_sum(table, exclusion);
        Self::top_with_others(&totals, top_n, others_from)
    }

    /// Same as [`Self::covid_death_summary`] after merging `from` into `into`.
    pub fn consolidated_death_summary(
        table: &ObservationTable,
        exclusion: &Exclusion,
        from: &str,
        into: &str,
        top_n: usize,
        others_from: usize,
    ) -> DeathSummary {
        let totals = Self::consolidate(Self::death_sum(table, exclusion), from, into);
        Self::top_with_others(&totals, top_n, others_from)
    }

    /// Join per-location deaths with population and rank by rate.
    ///
    /// Every location in `totals` must have a population entry, and that
    /// population must be non-zero.
    pub fn death_rate(
        totals: &[LocationTotal],
        population: &PopulationTable,
        top_n: usize,
    ) -> Result<DeathRateTable> {
        let mut rows = Vec::with_capacity(totals.len());
        for total in totals {
            let people = population
                .get(&total.location)
                .ok_or_else(|| PipelineError::MissingPopulation(total.location.clone()))?;
            if people == 0 {
                return Err(PipelineError::DivisionByZero(format!(
                    "population of '{}' is zero",
                    total.location
                )));
            }
            rows.push(DeathRate {
                location: total.location.clone(),
                deaths: total.deaths,
                population: people,
                rate_pct: total.deaths as f64 / people as f64 * 100.0,
            });
        }

        rows.sort_by(|a, b| {
            b.rate_pct
                .partial_cmp(&a.rate_pct)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.location.cmp(&b.location))
        });
        rows.truncate(top_n);
        Ok(DeathRateTable { rows })
    }

    /// Rank locations by the ratio of target-window to baseline-window
    /// mean weekly `death_total`.
    ///
    /// Locations with no observations in one of the windows are left
    /// out. Excluded locations are computed into
    /// [`WeeklyAverageReport::excluded`] and never ranked.
    pub fn weekly_average_increase(
        table: &ObservationTable,
        exclusion: &Exclusion,
        baseline: DateWindow,
        target: DateWindow,
        top_n: usize,
    ) -> Result<WeeklyAverageReport> {
        let mut weeks: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for obs in table.rows() {
            let entry = weeks.entry(obs.location.as_str()).or_default();
            if baseline.contains(obs.date) {
                entry.0.push(f64::from(obs.death_total));
            }
            if target.contains(obs.date) {
                entry.1.push(f64::from(obs.death_total));
            }
        }

        let mut ranked = Vec::new();
        let mut excluded = Vec::new();
        for (location, (baseline_weeks, target_weeks)) in weeks {
            if baseline_weeks.is_empty() || target_weeks.is_empty() {
                warn!(
                    "Skipping '{}': {} baseline weeks, {} target weeks",
                    location,
                    baseline_weeks.len(),
                    target_weeks.len()
                );
                continue;
            }

            let baseline_mean = baseline_weeks.iter().mean();
            let target_mean = target_weeks.iter().mean();
            if baseline_mean == 0.0 {
                return Err(PipelineError::DivisionByZero(format!(
                    "baseline weekly mean of '{}' is zero",
                    location
                )));
            }

            let row = AverageIncrease {
                location: location.to_string(),
                baseline_mean,
                target_mean,
                increase_ratio: target_mean / baseline_mean,
            };
            if exclusion.excludes(location) {
                excluded.push(row);
            } else {
                ranked.push(row);
            }
        }

        ranked.sort_by(|a, b| {
            b.increase_ratio
                .partial_cmp(&a.increase_ratio)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.location.cmp(&b.location))
        });
        ranked.truncate(top_n);

        for row in &excluded {
            info!(
                "Weekly average increase for '{}' (not ranked): {:.4}",
                row.location, row.increase_ratio
            );
        }
        if ranked.is_empty() && !table.is_empty() {
            warn!("No location has observations in both averaging windows");
        }

        Ok(WeeklyAverageReport { ranked, excluded })
    }
}
