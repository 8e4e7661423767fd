//! Data Processor Module
//! Merges the two normalized sources, cleans counts and builds the pivoted views.

use crate::data::table::{
    Metric, Observation, ObservationTable, PivotTable, PivotViews, RawObservation,
};
use crate::error::{PipelineError, Result};
use tracing::info;

/// Handles data cleaning and reshaping operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Concatenate the historical and recent sources into one cleaned table.
    ///
    /// Rows are kept in input order with no deduplication across the
    /// boundary between the sources. Missing counts become 0, then
    /// `death_non_covid = death_total - death_covid` is derived and all
    /// three counts are narrowed to `i32`.
    pub fn merge(
        historical: Vec<RawObservation>,
        recent: Vec<RawObservation>,
    ) -> Result<ObservationTable> {
        let rows = historical
            .into_iter()
            .chain(recent)
            .map(Self::clean)
            .collect::<Result<Vec<_>>>()?;

        info!("Merged {} observations", rows.len());
        Ok(ObservationTable::new(rows))
    }

    /// Fill, derive and narrow a single row.
    pub fn clean(raw: RawObservation) -> Result<Observation> {
        let total = raw.death_total.unwrap_or(0);
        let covid = raw.death_covid.unwrap_or(0);

        let overflow = |column: &'static str, value: i64| PipelineError::RangeOverflow {
            column,
            location: raw.location.clone(),
            date: raw.date.to_string(),
            value,
        };
        let narrow = |column: &'static str, value: i64| {
            i32::try_from(value).map_err(|_| overflow(column, value))
        };

        let death_total = narrow(Metric::Total.column_name(), total)?;
        let death_covid = narrow(Metric::Covid.column_name(), covid)?;
        // Both operands fit in i32 here, so the i64 difference cannot wrap.
        let non_covid = i64::from(death_total) - i64::from(death_covid);
        let death_non_covid = narrow(Metric::NonCovid.column_name(), non_covid)?;

        Ok(Observation {
            date: raw.date,
            location: raw.location,
            death_total,
            death_covid,
            death_non_covid,
        })
    }

    /// Build the covid, total and non-covid (date x location) views.
    pub fn pivot(table: &ObservationTable) -> PivotViews {
        let views = PivotViews {
            covid: PivotTable::build(table, Metric::Covid),
            total: PivotTable::build(table, Metric::Total),
            non_covid: PivotTable::build(table, Metric::NonCovid),
        };
        info!(
            "Pivoted {} dates x {} locations",
            views.total.dates().len(),
            views.total.locations().len()
        );
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(
        date: NaiveDate,
        location: &str,
        total: Option<i64>,
        covid: Option<i64>,
    ) -> RawObservation {
        RawObservation {
            date,
            location: location.to_string(),
            death_total: total,
            death_covid: covid,
        }
    }

    #[test]
    fn test_merge_ohio_scenario() {
        let historical = vec![raw(date(2018, 1, 6), "Ohio", Some(100), None)];
        let recent = vec![raw(date(2020, 1, 4), "Ohio", Some(120), Some(20))];

        let table = DataProcessor::merge(historical, recent).unwrap();
        assert_eq!(table.len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.death_covid, 0);
        assert_eq!(first.death_non_covid, 100);

        let second = &table.rows()[1];
        assert_eq!(second.date, date(2020, 1, 4));
        assert_eq!(second.death_non_covid, 100);
    }

    #[test]
    fn test_non_covid_is_exact_difference() {
        let rows = vec![
            raw(date(2020, 1, 4), "Ohio", Some(120), Some(20)),
            raw(date(2020, 1, 4), "Texas", None, Some(5)),
            raw(date(2020, 1, 4), "Utah", Some(7), None),
            raw(date(2020, 1, 4), "Iowa", None, None),
        ];
        let table = DataProcessor::merge(Vec::new(), rows).unwrap();

        for obs in table.rows() {
            assert_eq!(obs.death_non_covid, obs.death_total - obs.death_covid);
        }
        // Inconsistent source data is kept as-is, not clamped.
        assert_eq!(table.rows()[1].death_non_covid, -5);
    }

    #[test]
    fn test_boundary_rows_are_not_deduplicated() {
        let day = date(2019, 1, 5);
        let historical = vec![raw(day, "Ohio", Some(10), None)];
        let recent = vec![raw(day, "Ohio", Some(10), Some(0))];

        let table = DataProcessor::merge(historical, recent).unwrap();
        assert_eq!(table.len(), 2);

        let views = DataProcessor::pivot(&table);
        assert_eq!(views.total.get(day, "Ohio"), Some(20));
    }

    #[test]
    fn test_overflow_is_surfaced() {
        let rows = vec![raw(
            date(2020, 1, 4),
            "Ohio",
            Some(i64::from(i32::MAX) + 1),
            None,
        )];
        let err = DataProcessor::merge(rows, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOverflow);

        let rows = vec![raw(date(2020, 1, 4), "Ohio", Some(0), Some(i64::from(i32::MIN).abs()))];
        let err = DataProcessor::merge(rows, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOverflow);

        // Difference of two i64 extremes is an error, not a panic.
        let err = DataProcessor::clean(raw(date(2020, 1, 4), "Ohio", Some(i64::MIN), Some(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeOverflow);

        // Both counts fit in i32 but their difference does not.
        let err = DataProcessor::clean(raw(
            date(2020, 1, 4),
            "Ohio",
            Some(i64::from(i32::MIN)),
            Some(1),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RangeOverflow { column: "death_non_covid", .. }
        ));
    }

    #[test]
    fn test_pivot_date_sum_matches_national_row() {
        let day = date(2020, 4, 4);
        let rows = vec![
            raw(day, "Ohio", Some(120), Some(20)),
            raw(day, "Texas", Some(300), Some(45)),
            raw(day, "United States", Some(420), Some(65)),
        ];
        let table = DataProcessor::merge(Vec::new(), rows).unwrap();
        let views = DataProcessor::pivot(&table);
        let national = vec!["United States".to_string()];

        for metric in Metric::ALL {
            let pivot = views.get(metric);
            assert_eq!(
                pivot.date_total(day, &national),
                pivot.get(day, "United States")
            );
        }
    }

    #[test]
    fn test_empty_input_gives_empty_views() {
        let table = DataProcessor::merge(Vec::new(), Vec::new()).unwrap();
        let views = DataProcessor::pivot(&table);
        assert!(views.covid.is_empty());
        assert!(views.total.is_empty());
        assert!(views.non_covid.is_empty());
    }
}
