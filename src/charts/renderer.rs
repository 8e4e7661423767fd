//! Static Chart Renderer
//! Writes chart data to SVG files with plotters.
//!
//! Layout per chart:
//! 1. Title centered above the plot
//! 2. Plot area with labelled axes
//! 3. Legend (upper right) for multi-series charts

use crate::charts::plotter::{BarChart, Chart, ComparisonChart, LineChart, ScatterChart};
use crate::error::{PipelineError, Result};
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FONT: &str = "sans-serif";
const TITLE_SIZE: u32 = 28;
const ANNOTATION_SIZE: u32 = 14;
const BAR_HALF_WIDTH: f64 = 0.35;

// Distribution bar palette
const BAR_COLORS: [RGBColor; 6] = [
    RGBColor(173, 216, 230), // lightblue
    RGBColor(176, 196, 222), // lightsteelblue
    RGBColor(255, 165, 0),   // orange
    RGBColor(240, 128, 128), // lightcoral
    RGBColor(255, 248, 220), // cornsilk
    RGBColor(245, 245, 245), // whitesmoke
];

/// Consumer of chart data.
pub trait ChartSink {
    fn render(&mut self, chart: &Chart) -> Result<()>;
}

/// Keeps charts in memory.
#[derive(Debug, Default)]
pub struct ChartCollector {
    pub charts: Vec<Chart>,
}

impl ChartSink for ChartCollector {
    fn render(&mut self, chart: &Chart) -> Result<()> {
        self.charts.push(chart.clone());
        Ok(())
    }
}

/// Renders each chart to `<directory>/<slug>.svg`.
pub struct SvgChartRenderer {
    directory: PathBuf,
    size: (u32, u32),
    written: Vec<PathBuf>,
}

impl SvgChartRenderer {
    pub fn new(directory: impl Into<PathBuf>, width: u32, height: u32) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            size: (width, height),
            written: Vec::new(),
        })
    }

    /// Files written so far, in render order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn draw_scatter(&self, path: &Path, chart: &ScatterChart) -> Result<()> {
        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(PipelineError::render)?;

        let x_range = padded(chart.points.iter().map(|p| p.0));
        let y_range = padded(chart.points.iter().map(|p| p.1));

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, TITLE_SIZE).into_font())
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range, y_range)
            .map_err(PipelineError::render)?;

        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(PipelineError::render)?;

        ctx.draw_series(
            chart
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLUE.mix(0.5).filled())),
        )
        .map_err(PipelineError::render)?;

        root.present().map_err(PipelineError::render)?;
        Ok(())
    }

    fn draw_line(&self, path: &Path, chart: &LineChart) -> Result<()> {
        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(PipelineError::render)?;

        let last = chart.dates.len().saturating_sub(1).max(1) as f64;
        let y_range = padded(chart.series.iter().flat_map(|s| s.values.iter().copied()));
        let dates = &chart.dates;

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, TITLE_SIZE).into_font())
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..last, y_range)
            .map_err(PipelineError::render)?;

        ctx.configure_mesh()
            .x_labels(12)
            .x_label_formatter(&|x: &f64| {
                dates
                    .get(x.round().max(0.0) as usize)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            })
            .x_desc("date")
            .y_desc("deaths")
            .draw()
            .map_err(PipelineError::render)?;

        for (i, series) in chart.series.iter().enumerate() {
            let color = Palette99::pick(i).mix(0.9);
            ctx.draw_series(LineSeries::new(
                series
                    .values
                    .iter()
                    .enumerate()
                    .map(|(x, y)| (x as f64, *y)),
                color.stroke_width(2),
            ))
            .map_err(PipelineError::render)?
            .label(series.name.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(PipelineError::render)?;

        root.present().map_err(PipelineError::render)?;
        Ok(())
    }

    fn draw_bars(&self, path: &Path, chart: &BarChart) -> Result<()> {
        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(PipelineError::render)?;

        let labels: Vec<&str> = chart.bars.iter().map(|b| b.label.as_str()).collect();
        let y_range = value_range(chart.bars.iter().map(|b| b.value));

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, TITLE_SIZE).into_font())
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(category_range(labels.len()), y_range)
            .map_err(PipelineError::render)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&|x: &f64| category_label(&labels, *x))
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(PipelineError::render)?;

        ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
            let x = i as f64;
            let color = BAR_COLORS[i % BAR_COLORS.len()];
            Rectangle::new(
                [(x - BAR_HALF_WIDTH, 0.0), (x + BAR_HALF_WIDTH, bar.value)],
                color.filled(),
            )
        }))
        .map_err(PipelineError::render)?;

        ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
            Text::new(
                bar.annotation.clone(),
                (i as f64 - BAR_HALF_WIDTH, bar.value),
                (FONT, ANNOTATION_SIZE).into_font(),
            )
        }))
        .map_err(PipelineError::render)?;

        root.present().map_err(PipelineError::render)?;
        Ok(())
    }

    fn draw_comparison(&self, path: &Path, chart: &ComparisonChart) -> Result<()> {
        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(PipelineError::render)?;

        let labels: Vec<&str> = chart.categories.iter().map(String::as_str).collect();
        let y_range = value_range(chart.series.iter().flat_map(|s| s.values.iter().copied()));

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, TITLE_SIZE).into_font())
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(category_range(labels.len()), y_range)
            .map_err(PipelineError::render)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&|x: &f64| category_label(&labels, *x))
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(PipelineError::render)?;

        let width = 2.0 * BAR_HALF_WIDTH / chart.series.len().max(1) as f64;
        for (s, series) in chart.series.iter().enumerate() {
            let color = Palette99::pick(s).mix(0.8);
            let offset = -BAR_HALF_WIDTH + s as f64 * width;
            ctx.draw_series(series.values.iter().enumerate().map(|(i, value)| {
                let left = i as f64 + offset;
                Rectangle::new([(left, 0.0), (left + width, *value)], color.filled())
            }))
            .map_err(PipelineError::render)?
            .label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(PipelineError::render)?;

        root.present().map_err(PipelineError::render)?;
        Ok(())
    }
}

impl ChartSink for SvgChartRenderer {
    fn render(&mut self, chart: &Chart) -> Result<()> {
        if chart.is_empty() {
            debug!("Skipping empty chart '{}'", chart.title());
            return Ok(());
        }

        let path = self.directory.join(format!("{}.svg", chart.slug()));
        match chart {
            Chart::Scatter(c) => self.draw_scatter(&path, c)?,
            Chart::Line(c) => self.draw_line(&path, c)?,
            Chart::Bar(c) => self.draw_bars(&path, c)?,
            Chart::Comparison(c) => self.draw_comparison(&path, c)?,
        }

        info!("Wrote chart {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Data extent with 5% padding; a degenerate extent is widened by 1.
fn padded(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return 0.0..1.0;
    }
    if max - min < f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

/// Bar heights always start from zero; headroom leaves space for annotations.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max - min < f64::EPSILON {
        return min..(min + 1.0);
    }
    (min * 1.15)..(max * 1.15)
}

fn category_range(count: usize) -> Range<f64> {
    -0.5..(count.max(1) as f64 - 0.5)
}

fn category_label(labels: &[&str], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels
        .get(index as usize)
        .map(|l| l.to_string())
        .unwrap_or_default()
}
