//! Charts module - Chart data and rendering

mod plotter;
mod renderer;

pub use plotter::{
    share_label, Bar, BarChart, Chart, ChartPlotter, ComparisonChart, LineChart, NamedSeries,
    ScatterChart,
};
pub use renderer::{ChartCollector, ChartSink, SvgChartRenderer};
