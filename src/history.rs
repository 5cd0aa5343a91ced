//! Results history: one CSV row per completed session.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::SessionSummary;
use crate::scoring::ModelFamily;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file: {0}")]
    Io(#[from] std::io::Error),
    #[error("history csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub finished_at: String,
    pub exercise: String,
    pub family: ModelFamily,
    pub time_budget_secs: u32,
    pub score: u32,
    pub result: String,
}

impl From<&SessionSummary> for HistoryRecord {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            finished_at: summary.finished_at.to_rfc3339(),
            exercise: summary.exercise.clone(),
            family: summary.family,
            time_budget_secs: summary.time_budget_secs,
            score: summary.score,
            result: summary.result.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, summary: &SessionSummary) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // If the file doesn't exist yet, emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(HistoryRecord::from(summary))?;
        writer.flush()?;
        Ok(())
    }

    /// All recorded sessions, oldest first. A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader.deserialize().collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
