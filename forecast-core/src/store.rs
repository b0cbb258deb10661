use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::ForecastRecord;

/// Append-only CSV file of forecast records.
///
/// Rows accumulate across runs; nothing is ever deduplicated or rewritten.
#[derive(Debug, Clone)]
pub struct ForecastStore {
    path: PathBuf,
}

impl ForecastStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_one(&self, record: &ForecastRecord) -> Result<()> {
        self.append(std::slice::from_ref(record))
    }

    /// Append rows, writing the header only when the file is created.
    pub fn append(&self, records: &[ForecastRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open forecast file: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(!exists).from_writer(file);
        for record in records {
            writer
                .serialize(record)
                .with_context(|| format!("Failed to write forecast row to {}", self.path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush forecast file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), rows = records.len(), header = !exists, "appended forecasts");
        Ok(())
    }

    /// Read every stored record. A missing file holds no records.
    pub fn load(&self) -> Result<Vec<ForecastRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open forecast file: {}", self.path.display()))?;

        reader
            .deserialize::<ForecastRecord>()
            .enumerate()
            .map(|(i, row)| {
                row.with_context(|| {
                    format!("Failed to parse row {} of {}", i + 1, self.path.display())
                })
            })
            .collect()
    }
}
