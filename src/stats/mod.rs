//! Stats module - Summary aggregation

mod aggregator;

pub use aggregator::{
    Aggregator, AverageIncrease, DateWindow, DeathRate, DeathRateTable, DeathSummary,
    Exclusion, LocationTotal, WeeklyAverageReport, OTHERS_LABEL,
};
