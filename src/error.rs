//! Error types for the mortality pipeline.
//!
//! Every stage returns [`PipelineError`]. Variants are grouped into coarse
//! [`ErrorKind`]s so callers and tests can match on the failure class
//! without caring about the payload.

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure class of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    DataFormat,
    DivisionByZero,
    RangeOverflow,
    Io,
    Storage,
    Render,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Missing column '{column}' in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid value {value:?} in column '{column}' at row {row} of {}", path.display())]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("No population entry for location '{0}'")]
    MissingPopulation(String),

    #[error("Duplicate population entry for location '{0}'")]
    DuplicatePopulation(String),

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Value {value} of {column} for '{location}' on {date} exceeds the 32-bit range")]
    RangeOverflow {
        column: &'static str,
        location: String,
        date: String,
        value: i64,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Container group '{0}' was not declared")]
    UndeclaredGroup(String),

    #[error("Container group '{0}' already holds a table")]
    GroupAlreadyWritten(String),

    #[error("Container already exists: {}", .0.display())]
    ContainerExists(PathBuf),

    #[error("Chart rendering failed: {0}")]
    Render(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::FileNotFound(_) => ErrorKind::FileNotFound,
            PipelineError::MissingColumn { .. }
            | PipelineError::InvalidValue { .. }
            | PipelineError::MissingPopulation(_)
            | PipelineError::DuplicatePopulation(_) => ErrorKind::DataFormat,
            PipelineError::DivisionByZero(_) => ErrorKind::DivisionByZero,
            PipelineError::RangeOverflow { .. } => ErrorKind::RangeOverflow,
            PipelineError::Polars(_) | PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Zip(_)
            | PipelineError::UndeclaredGroup(_)
            | PipelineError::GroupAlreadyWritten(_)
            | PipelineError::ContainerExists(_) => ErrorKind::Storage,
            PipelineError::Render(_) => ErrorKind::Render,
        }
    }

    pub(crate) fn render(err: impl std::fmt::Display) -> Self {
        PipelineError::Render(err.to_string())
    }
}
