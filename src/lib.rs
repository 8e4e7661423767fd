//! Mortality Pivot - weekly US mortality analysis
//!
//! Loads two weekly death-count CSV sources, merges them into one cleaned
//! observation table, pivots it per metric, computes the summary tables,
//! charts them and stores the tables in a keyed container file.

pub mod charts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod stats;
pub mod store;

pub use error::{ErrorKind, PipelineError, Result};
pub use pipeline::{Analysis, Inputs, Pipeline, RunReport};
