//! Chart Plotter Module
//! Builds self-contained chart data from the cleaned table, the pivoted
//! views and the summary tables. Rendering is left to a [`ChartSink`].
//!
//! [`ChartSink`]: crate::charts::ChartSink

use crate::config::TimelineConfig;
use crate::data::{Metric, ObservationTable, PivotViews};
use crate::stats::{DateWindow, DeathRateTable, DeathSummary, WeeklyAverageReport};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// (x, y) points for a scatter plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
}

/// A named sequence of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// Several series sharing one date axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub dates: Vec<NaiveDate>,
    pub series: Vec<NamedSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub annotation: String,
}

/// Ranked category -> value bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
}

/// Two series side by side per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonChart {
    pub title: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub series: Vec<NamedSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Chart {
    Scatter(ScatterChart),
    Line(LineChart),
    Bar(BarChart),
    Comparison(ComparisonChart),
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Scatter(c) => &c.title,
            Chart::Line(c) => &c.title,
            Chart::Bar(c) => &c.title,
            Chart::Comparison(c) => &c.title,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Chart::Scatter(c) => c.points.is_empty(),
            Chart::Line(c) => c.dates.is_empty() || c.series.is_empty(),
            Chart::Bar(c) => c.bars.is_empty(),
            Chart::Comparison(c) => c.categories.is_empty(),
        }
    }

    /// File stem derived from the title.
    pub fn slug(&self) -> String {
        let mut slug = String::new();
        for ch in self.title().chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        slug.trim_matches('_').to_string()
    }
}

/// Percentage annotation used on the distribution chart: share with four
/// decimals and the absolute count it stands for.
pub fn share_label(pct: f64, total: i64) -> String {
    format!("{:.4}%\n({:.0})", pct, total as f64 * pct / 100.0)
}

/// Creates chart data for each of the analysis views.
pub struct ChartPlotter;

impl ChartPlotter {
    /// National COVID vs non-COVID weekly deaths.
    pub fn nationwide_scatter(
        table: &ObservationTable,
        national_label: &str,
        after: NaiveDate,
    ) -> ScatterChart {
        let window = DateWindow::after(after);
        let points = table
            .select(national_label, move |d| window.contains(d))
            .map(|o| (f64::from(o.death_covid), f64::from(o.death_non_covid)))
            .collect();

        ScatterChart {
            title: format!(
                "Nationwide Death in {}",
                after.succ_opt().unwrap_or(after).format("%Y")
            ),
            x_label: Metric::Covid.column_name().to_string(),
            y_label: Metric::NonCovid.column_name().to_string(),
            points,
        }
    }

    /// Every metric of every configured location over time, read from the
    /// pivoted views. Locations missing from the data are left out.
    pub fn timeline(views: &PivotViews, timeline: &TimelineConfig) -> LineChart {
        let window = DateWindow::after(timeline.after);
        let keep: Vec<bool> = views
            .total
            .dates()
            .iter()
            .map(|d| window.contains(*d))
            .collect();
        let dates = views
            .total
            .dates()
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(d, _)| *d)
            .collect();

        let mut series = Vec::new();
        for location in &timeline.locations {
            for metric in Metric::ALL {
                let Some(column) = views.get(metric).column(location) else {
                    continue;
                };
                let values = column
                    .into_iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| v as f64)
                    .collect();
                series.push(NamedSeries {
                    name: format!("{} {}", location, metric.column_name()),
                    values,
                });
            }
        }

        LineChart {
            title: timeline.title.clone(),
            dates,
            series,
        }
    }

    /// Top locations plus "Others", annotated with their share of the total.
    ///
    /// A zero total (no COVID deaths anywhere) gives every bar a 0% share.
    pub fn distribution(title: &str, summary: &DeathSummary) -> BarChart {
        if summary.total == 0 && !summary.is_empty() {
            debug!("'{}' has no deaths to share out", title);
        }

        let bars = summary
            .rows
            .iter()
            .map(|row| Bar {
                label: row.location.clone(),
                value: row.deaths as f64,
                annotation: share_label(
                    summary.percentage(row.deaths).unwrap_or(0.0),
                    summary.total,
                ),
            })
            .collect();

        BarChart {
            title: title.to_string(),
            y_label: Metric::Covid.column_name().to_string(),
            bars,
        }
    }

    pub fn death_rate(rates: &DeathRateTable) -> BarChart {
        BarChart {
            title: "COVID Death Rate".to_string(),
            y_label: "rate_pct".to_string(),
            bars: rates
                .rows
                .iter()
                .map(|r| Bar {
                    label: r.location.clone(),
                    value: r.rate_pct,
                    annotation: format!("{:.4}%", r.rate_pct),
                })
                .collect(),
        }
    }

    /// Baseline vs target weekly mean for the ranked locations.
    pub fn weekly_comparison(report: &WeeklyAverageReport) -> ComparisonChart {
        ComparisonChart {
            title: "Weekly Average Death".to_string(),
            y_label: "mean weekly death_total".to_string(),
            categories: report.ranked.iter().map(|r| r.location.clone()).collect(),
            series: vec![
                NamedSeries {
                    name: "baseline".to_string(),
                    values: report.ranked.iter().map(|r| r.baseline_mean).collect(),
                },
                NamedSeries {
                    name: "target".to_string(),
                    values: report.ranked.iter().map(|r| r.target_mean).collect(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataProcessor, Observation};
    use crate::stats::{AverageIncrease, DeathRate, LocationTotal, OTHERS_LABEL};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, location: &str, total: i32, covid: i32) -> Observation {
        Observation {
            date,
            location: location.to_string(),
            death_total: total,
            death_covid: covid,
            death_non_covid: total - covid,
        }
    }

    #[test]
    fn test_share_label() {
        assert_eq!(share_label(25.0, 400), "25.0000%\n(100)");
    }

    #[test]
    fn test_slug() {
        let chart = Chart::Bar(BarChart {
            title: "COVID Death Distribution".into(),
            y_label: String::new(),
            bars: Vec::new(),
        });
        assert_eq!(chart.slug(), "covid_death_distribution");
        assert!(chart.is_empty());
    }

    #[test]
    fn test_nationwide_scatter_window() {
        let table = ObservationTable::new(vec![
            obs(date(2020, 1, 1), "United States", 100, 1),
            obs(date(2020, 1, 4), "United States", 120, 20),
            obs(date(2020, 1, 4), "Ohio", 10, 2),
        ]);
        let chart = ChartPlotter::nationwide_scatter(&table, "United States", date(2020, 1, 1));
        assert_eq!(chart.title, "Nationwide Death in 2020");
        assert_eq!(chart.points, vec![(20.0, 100.0)]);
    }

    #[test]
    fn test_timeline_reads_pivots() {
        let table = ObservationTable::new(vec![
            obs(date(2018, 12, 29), "New York", 50, 0),
            obs(date(2019, 1, 5), "New York", 60, 0),
            obs(date(2020, 4, 4), "New York City", 900, 600),
            obs(date(2020, 4, 4), "Ohio", 10, 1),
        ]);
        let views = DataProcessor::pivot(&table);
        let config = TimelineConfig {
            title: "New York".into(),
            locations: vec!["New York".into(), "New York City".into(), "Nowhere".into()],
            after: date(2019, 1, 1),
        };

        let chart = ChartPlotter::timeline(&views, &config);
        assert_eq!(chart.dates, vec![date(2019, 1, 5), date(2020, 4, 4)]);
        assert_eq!(chart.series.len(), 6);
        assert_eq!(chart.series[0].name, "New York death_total");
        assert_eq!(chart.series[0].values, vec![60.0, 0.0]);
        let nyc_covid = chart
            .series
            .iter()
            .find(|s| s.name == "New York City death_covid")
            .unwrap();
        assert_eq!(nyc_covid.values, vec![0.0, 600.0]);
    }

    #[test]
    fn test_distribution_annotations() {
        let summary = DeathSummary {
            rows: vec![
                LocationTotal { location: "Ohio".into(), deaths: 30 },
                LocationTotal { location: OTHERS_LABEL.into(), deaths: 10 },
            ],
            dropped: Vec::new(),
            total: 40,
        };
        let chart = ChartPlotter::distribution("COVID Death Distribution", &summary);
        assert_eq!(chart.bars.len(), 2);
        assert_eq!(chart.bars[0].annotation, "75.0000%\n(30)");
        assert_eq!(chart.bars[1].label, OTHERS_LABEL);
    }

    #[test]
    fn test_empty_distribution_is_not_an_error() {
        let chart =
            ChartPlotter::distribution("COVID Death Distribution", &DeathSummary::default());
        assert!(Chart::Bar(chart).is_empty());
    }

    #[test]
    fn test_zero_total_distribution_shares_nothing() {
        let summary = DeathSummary {
            rows: vec![
                LocationTotal { location: "Ohio".into(), deaths: 0 },
                LocationTotal { location: OTHERS_LABEL.into(), deaths: 0 },
            ],
            dropped: Vec::new(),
            total: 0,
        };
        let chart = ChartPlotter::distribution("COVID Death Distribution", &summary);
        assert_eq!(chart.bars.len(), 2);
        assert!(chart.bars.iter().all(|b| b.annotation == "0.0000%\n(0)"));
        assert!(!Chart::Bar(chart).is_empty());
    }

    #[test]
    fn test_rate_and_comparison_shapes() {
        let rates = DeathRateTable {
            rows: vec![DeathRate {
                location: "Utah".into(),
                deaths: 200,
                population: 10_000,
                rate_pct: 2.0,
            }],
        };
        let rate_chart = ChartPlotter::death_rate(&rates);
        assert_eq!(rate_chart.bars[0].annotation, "2.0000%");

        let report = WeeklyAverageReport {
            ranked: vec![AverageIncrease {
                location: "Ohio".into(),
                baseline_mean: 200.0,
                target_mean: 300.0,
                increase_ratio: 1.5,
            }],
            excluded: Vec::new(),
        };
        let comparison = ChartPlotter::weekly_comparison(&report);
        assert_eq!(comparison.categories, vec!["Ohio".to_string()]);
        assert_eq!(comparison.series[0].values, vec![200.0]);
        assert_eq!(comparison.series[1].values, vec![300.0]);
    }
}
