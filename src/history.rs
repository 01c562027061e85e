use crate::app_dirs::{AppDirs, HISTORY_FILE};
use crate::error::{Error, Result};
use crate::session::SessionSummary;
use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One completed session as stored in the CSV log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub times: String,
    pub average: u64,
    pub best: u64,
    pub verdict: String,
}

impl HistoryEntry {
    pub fn from_summary(summary: &SessionSummary, at: DateTime<Local>) -> Self {
        Self {
            date: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            times: summary.times.iter().join(" "),
            average: summary.average,
            best: summary.best,
            verdict: summary.verdict.label().to_string(),
        }
    }

    pub fn reaction_times(&self) -> Vec<u64> {
        self.times
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect()
    }
}

/// Append-only log of completed sessions
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new() -> Result<Self> {
        let path = AppDirs::history_path().ok_or(Error::NoStateDir("history"))?;
        Ok(Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    /// History kept in the same directory as a records database
    pub fn beside<P: AsRef<Path>>(db_path: P) -> Self {
        Self::with_path(db_path.as_ref().with_file_name(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, summary: &SessionSummary, at: DateTime<Local>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // header only goes into a fresh file
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        writer.serialize(HistoryEntry::from_summary(summary, at))?;
        writer.flush()?;
        Ok(())
    }

    /// The most recent `n` sessions, oldest first
    pub fn last(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut entries = Vec::new();
        for row in reader.deserialize() {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("skipping unreadable history row: {}", e),
            }
        }

        let skip = entries.len().saturating_sub(n);
        Ok(entries.into_iter().skip(skip).collect())
    }
}
