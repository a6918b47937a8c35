// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run history read back from persisted reports

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{is_report_file, PipelineRunReport};
use crate::errors::{PipewrightError, PipewrightResult};

/// Recent runs, oldest first
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    runs: Vec<PipelineRunReport>,
}

/// Summary over a [`RunHistory`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_runs: usize,
    /// Percentage of successful runs, one decimal
    pub success_rate: f64,
    /// Mean run duration in seconds, one decimal
    pub avg_duration: f64,
    pub last_run: Option<PipelineRunReport>,
}

impl RunHistory {
    /// Number of runs kept
    pub const MAX_RUNS: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Load the most recent reports from `reports_dir`
    ///
    /// A missing directory is an empty history. Files that cannot be read or
    /// parsed are skipped.
    pub fn load(reports_dir: &Path) -> PipewrightResult<Self> {
        if !reports_dir.exists() {
            debug!("No reports directory at {}", reports_dir.display());
            return Ok(Self::new());
        }

        let entries = std::fs::read_dir(reports_dir).map_err(|e| PipewrightError::FileReadError {
            path: reports_dir.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_report_file(path))
            .collect();

        // Names embed the start time, so lexical order is chronological
        files.sort();

        let mut history = Self::new();
        for path in files {
            match std::fs::read_to_string(&path)
                .map_err(PipewrightError::from)
                .and_then(|json| PipelineRunReport::from_json(&json))
            {
                Ok(report) => history.push(report),
                Err(e) => warn!("Skipping report {}: {}", path.display(), e),
            }
        }

        Ok(history)
    }

    /// Append a run, dropping the oldest beyond [`Self::MAX_RUNS`]
    pub fn push(&mut self, report: PipelineRunReport) {
        self.runs.push(report);
        if self.runs.len() > Self::MAX_RUNS {
            let excess = self.runs.len() - Self::MAX_RUNS;
            self.runs.drain(..excess);
        }
    }

    pub fn runs(&self) -> &[PipelineRunReport] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn stats(&self) -> HistoryStats {
        let total_runs = self.runs.len();
        if total_runs == 0 {
            return HistoryStats {
                total_runs: 0,
                success_rate: 0.0,
                avg_duration: 0.0,
                last_run: None,
            };
        }

        let successful = self.runs.iter().filter(|r| r.success).count();
        let total_secs: f64 = self.runs.iter().map(|r| r.duration.as_secs_f64()).sum();

        HistoryStats {
            total_runs,
            success_rate: round1(successful as f64 / total_runs as f64 * 100.0),
            avg_duration: round1(total_secs / total_runs as f64),
            last_run: self.runs.last().cloned(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
