//! Sequential analysis pipeline.
//!
//! load -> merge/clean -> pivot -> aggregate -> chart -> persist. Each
//! stage materializes its whole output before the next one starts.

use crate::charts::{Chart, ChartPlotter, ChartSink};
use crate::config::Config;
use crate::data::{
    DataLoader, DataProcessor, ObservationTable, PivotViews, PopulationTable, RawObservation,
};
use crate::error::Result;
use crate::stats::{Aggregator, DeathRateTable, DeathSummary, WeeklyAverageReport};
use crate::store::{
    ContainerStore, COVID_DEATH_RATE, COVID_DEATH_SUMMARY, DEATH_DATA, GROUPS,
    WEEKLY_AVERAGE_DEATH,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Everything read from disk.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub historical: Vec<RawObservation>,
    pub recent: Vec<RawObservation>,
    pub population: PopulationTable,
}

/// Cleaned table, pivoted views and summary tables of one run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub table: ObservationTable,
    pub pivots: PivotViews,
    /// Top-N + Others with New York City ranked on its own.
    pub death_summary: DeathSummary,
    /// Top-N + Others after folding New York City into New York.
    pub consolidated_summary: DeathSummary,
    pub death_rates: DeathRateTable,
    pub weekly_average: WeeklyAverageReport,
}

/// What a run produced, for printing.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub observations: usize,
    pub container: PathBuf,
    pub charts: Vec<String>,
    pub covid_death_summary: &'a DeathSummary,
    pub covid_death_rate: &'a DeathRateTable,
    pub weekly_average_death: &'a WeeklyAverageReport,
}

pub struct Pipeline<'a> {
    config: &'a Config,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn load(&self) -> Result<Inputs> {
        Ok(Inputs {
            historical: DataLoader::load_source(&self.config.sources.historical)?,
            recent: DataLoader::load_source(&self.config.sources.recent)?,
            population: DataLoader::load_population(&self.config.population)?,
        })
    }

    pub fn analyze(&self, inputs: Inputs) -> Result<Analysis> {
        let params = &self.config.aggregate;
        let exclusion = params.exclusion();

        let table = DataProcessor::merge(inputs.historical, inputs.recent)?;
        let pivots = DataProcessor::pivot(&table);

        let death_summary =
            Aggregator::covid_death_summary(&table, &exclusion, params.top_n, params.others_from);
        let consolidated_summary = Aggregator::consolidated_death_summary(
            &table,
            &exclusion,
            &params.consolidate_from,
            &params.consolidate_into,
            params.top_n,
            params.others_from,
        );

        let consolidated = Aggregator::consolidate(
            Aggregator::death_sum(&table, &exclusion),
            &params.consolidate_from,
            &params.consolidate_into,
        );
        let death_rates = Aggregator::death_rate(&consolidated, &inputs.population, params.top_n)?;

        let weekly_average = Aggregator::weekly_average_increase(
            &table,
            &exclusion,
            params.baseline_window(),
            params.target_window(),
            params.top_n,
        )?;

        info!(
            "Summaries: {} distribution rows, {} rate rows, {} weekly average rows",
            consolidated_summary.rows.len(),
            death_rates.rows.len(),
            weekly_average.ranked.len()
        );

        Ok(Analysis {
            table,
            pivots,
            death_summary,
            consolidated_summary,
            death_rates,
            weekly_average,
        })
    }

    /// Chart data for every view, in display order.
    pub fn charts(&self, analysis: &Analysis) -> Vec<Chart> {
        let charts_config = &self.config.charts;
        let mut charts = vec![Chart::Scatter(ChartPlotter::nationwide_scatter(
            &analysis.table,
            &self.config.aggregate.national_label,
            charts_config.scatter_after,
        ))];

        for timeline in &charts_config.timelines {
            charts.push(Chart::Line(ChartPlotter::timeline(&analysis.pivots, timeline)));
        }

        charts.push(Chart::Bar(ChartPlotter::distribution(
            "COVID Death Distribution",
            &analysis.death_summary,
        )));
        charts.push(Chart::Bar(ChartPlotter::distribution(
            &format!(
                "COVID Death Distribution ({} consolidated)",
                self.config.aggregate.consolidate_into
            ),
            &analysis.consolidated_summary,
        )));
        charts.push(Chart::Bar(ChartPlotter::death_rate(&analysis.death_rates)));
        charts.push(Chart::Comparison(ChartPlotter::weekly_comparison(
            &analysis.weekly_average,
        )));

        charts
    }

    /// Write the four summary tables to the container.
    ///
    /// Frames are built before the container is touched, so a conversion
    /// failure leaves no file behind. A failure between the two phases
    /// can still leave declared groups without a table.
    pub fn persist(&self, analysis: &Analysis) -> Result<PathBuf> {
        let mut frames = vec![
            (DEATH_DATA, analysis.table.to_frame()?),
            (WEEKLY_AVERAGE_DEATH, analysis.weekly_average.to_frame()?),
            (COVID_DEATH_SUMMARY, analysis.consolidated_summary.to_frame()?),
            (COVID_DEATH_RATE, analysis.death_rates.to_frame()?),
        ];

        let output = &self.config.output;
        let mut store = ContainerStore::create(&output.container, &GROUPS, output.overwrite)?;
        for (group, frame) in frames.iter_mut() {
            store.append(group, frame)?;
        }

        Ok(store.path().to_path_buf())
    }

    /// Run every stage. Charts go to `sink` when one is given.
    pub fn run(&self, sink: Option<&mut dyn ChartSink>) -> Result<(Analysis, PathBuf)> {
        let inputs = self.load()?;
        let analysis = self.analyze(inputs)?;

        if let Some(sink) = sink {
            for chart in self.charts(&analysis) {
                sink.render(&chart)?;
            }
        }

        let container = self.persist(&analysis)?;
        info!("Pipeline finished: {}", container.display());
        Ok((analysis, container))
    }
}

impl Analysis {
    pub fn report(&self, container: PathBuf, charts: Vec<String>) -> RunReport<'_> {
        RunReport {
            observations: self.table.len(),
            container,
            charts,
            covid_death_summary: &self.consolidated_summary,
            covid_death_rate: &self.death_rates,
            weekly_average_death: &self.weekly_average,
        }
    }
}
