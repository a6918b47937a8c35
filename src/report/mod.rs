// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run reports
//!
//! A finished run is persisted as pretty-printed JSON under
//! `<working_dir>/reports/`.

mod history;

pub use history::{HistoryStats, RunHistory};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{PipewrightError, PipewrightResult};
use crate::executors::{StepResult, StepStatus};
use crate::utils::format::{duration_secs, local_timestamp};

/// Directory, relative to the working directory, that holds reports
pub const REPORTS_DIR: &str = "reports";

const FILE_PREFIX: &str = "pipeline_report_";

/// Complete record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunReport {
    /// Definition file the run was loaded from, if any
    #[serde(default)]
    pub pipeline_file: Option<PathBuf>,

    #[serde(with = "local_timestamp")]
    pub start_time: NaiveDateTime,

    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Concurrent results (completion order), then sequential, then cleanup
    pub steps: Vec<StepResult>,

    pub success: bool,
}

impl PipelineRunReport {
    /// File name derived from the start time
    pub fn file_name(&self) -> String {
        format!("{}{}.json", FILE_PREFIX, self.start_time.format("%Y%m%d_%H%M%S"))
    }

    pub fn to_json(&self) -> PipewrightResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> PipewrightResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of steps with the given status
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Whether `path` looks like a file written by [`ReportWriter`]
pub(crate) fn is_report_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX))
}

/// Persists reports to a directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Writer for `<working_dir>/reports`
    pub fn for_working_dir(working_dir: &Path) -> Self {
        Self::new(working_dir.join(REPORTS_DIR))
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Write the report, creating the directory if needed
    pub async fn write(&self, report: &PipelineRunReport) -> PipewrightResult<PathBuf> {
        let path = self.reports_dir.join(report.file_name());
        let write_error = |e: std::io::Error| PipewrightError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| PipewrightError::FileWriteError {
                path: self.reports_dir.clone(),
                error: e.to_string(),
            })?;

        let json = report.to_json()?;
        tokio::fs::write(&path, json).await.map_err(write_error)?;

        tracing::info!("Pipeline report saved to {}", path.display());
        Ok(path)
    }
}
