//! Data module - CSV loading, cleaning and reshaping

mod loader;
mod processor;
mod table;

pub use loader::{DataLoader, PopulationTable};
pub use processor::DataProcessor;
pub use table::{
    ColumnType, Metric, Observation, ObservationTable, PivotTable, PivotViews, RawObservation,
};
