//! Table Container Module
//! Persists summary tables into a single keyed ZIP container, one Parquet
//! table per group.
//!
//! Writing is two-phase: [`ContainerStore::create`] creates the file
//! exclusively and declares every group as a directory entry, then each
//! [`ContainerStore::append`] reopens the archive in append mode and adds
//! `<group>/table.parquet`. A failed append leaves earlier groups intact.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Full cleaned observation table.
pub const DEATH_DATA: &str = "death_data";
/// Top-N weekly average increase table.
pub const WEEKLY_AVERAGE_DEATH: &str = "weekly_average_death";
/// Top-N + Others COVID death table.
pub const COVID_DEATH_SUMMARY: &str = "covid_death_summary";
/// Top-N COVID death rate table.
pub const COVID_DEATH_RATE: &str = "covid_death_rate";

pub const GROUPS: [&str; 4] = [
    DEATH_DATA,
    WEEKLY_AVERAGE_DEATH,
    COVID_DEATH_SUMMARY,
    COVID_DEATH_RATE,
];

const TABLE_FILE: &str = "table.parquet";

/// Handle on a container whose groups have been declared.
#[derive(Debug)]
pub struct ContainerStore {
    path: PathBuf,
    declared: Vec<String>,
    written: Vec<String>,
}

impl ContainerStore {
    /// Phase one: create the container and declare `groups`.
    ///
    /// Fails if the file exists, unless `overwrite` is set, in which case
    /// the old file is removed first.
    pub fn create(path: &Path, groups: &[&str], overwrite: bool) -> Result<Self> {
        if overwrite && path.exists() {
            debug!("Removing existing container {}", path.display());
            fs::remove_file(path)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PipelineError::ContainerExists(path.to_path_buf()),
                _ => PipelineError::Io(e),
            })?;

        let mut zip = ZipWriter::new(file);
        for group in groups {
            zip.add_directory(format!("{}/", group), FileOptions::default())?;
        }
        zip.finish()?;

        info!(
            "Declared {} groups in {}",
            groups.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            declared: groups.iter().map(|g| g.to_string()).collect(),
            written: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Phase two: write one table into its declared group.
    pub fn append(&mut self, group: &str, frame: &mut DataFrame) -> Result<()> {
        if !self.declared.iter().any(|g| g == group) {
            return Err(PipelineError::UndeclaredGroup(group.to_string()));
        }
        if self.written.iter().any(|g| g == group) {
            return Err(PipelineError::GroupAlreadyWritten(group.to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let mut zip = ZipWriter::new_append(file)?;
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(format!("{}/{}", group, TABLE_FILE), options)?;
        ParquetWriter::new(&mut zip).finish(frame)?;
        zip.finish()?;

        info!("Wrote {} rows to group '{}'", frame.height(), group);
        self.written.push(group.to_string());
        Ok(())
    }

    /// Groups declared in the container at `path`, in archive order.
    pub fn groups(path: &Path) -> Result<Vec<String>> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut groups = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if let Some(group) = entry.name().strip_suffix('/') {
                groups.push(group.to_string());
            }
        }
        Ok(groups)
    }

    /// Read back the table stored under `group`.
    pub fn read_table(path: &Path, group: &str) -> Result<DataFrame> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut entry = archive.by_name(&format!("{}/{}", group, TABLE_FILE))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
    }
}
