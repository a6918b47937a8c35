// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline runner
//!
//! Drives a whole run: concurrent phase, sequential phase, cleanup, report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::phases::PhaseRunner;
use super::{PipelineDefinition, PipelineValidator};
use crate::cancel::{CancellationController, StopReason};
use crate::executors::{CommandRunner, ProcessSupervisor, StepContext, StepExecutor};
use crate::progress::{EventKind, ProgressEvent, ProgressReporter, ProgressSink};
use crate::report::{PipelineRunReport, ReportWriter};

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run `parallel_steps` concurrently; they are skipped otherwise
    pub parallel: bool,

    /// Keep going after a failed step
    pub continue_on_error: bool,

    /// Applied over the definition's own environment
    pub env_overrides: HashMap<String, String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }
}

/// Result of [`PipelineRunner::run`]
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    /// `None` when the definition could not be loaded or was invalid
    pub report: Option<PipelineRunReport>,
    /// `None` when no report was written
    pub report_path: Option<PathBuf>,
}

impl RunOutcome {
    fn aborted() -> Self {
        Self {
            success: false,
            report: None,
            report_path: None,
        }
    }
}

/// Stops a run from another task or thread
#[derive(Clone)]
pub struct StopHandle {
    controller: CancellationController,
    reporter: ProgressReporter,
}

impl StopHandle {
    /// Request a stop
    ///
    /// Running steps are terminated, no new steps start, cleanup still runs.
    /// Returns `true` for the call that actually stopped the run.
    pub fn request_stop(&self) -> bool {
        if !self.controller.request_stop() {
            return false;
        }

        info!(
            "Pipeline stop requested, terminating: {:?}",
            self.controller.active_steps()
        );
        self.reporter.emit(
            ProgressEvent::new(EventKind::PipelineStopped).with_message("User requested stop"),
        );
        true
    }

    pub fn is_stop_requested(&self) -> bool {
        self.controller.is_stop_requested()
    }

    /// Kill running processes immediately, without a grace period
    ///
    /// Used when a second interrupt arrives during a stop. Returns the number
    /// of processes killed.
    pub fn force_stop(&self) -> usize {
        self.request_stop();
        self.controller.kill_active()
    }
}

/// Top-level pipeline runner
///
/// A runner performs one run: once stopped it stays stopped. Create a new
/// runner for the next run.
pub struct PipelineRunner {
    reporter: ProgressReporter,
    controller: CancellationController,
    grace_period: Duration,
    /// `None` runs commands with a [`ProcessSupervisor`]
    command_runner: Option<Arc<dyn CommandRunner>>,
}

impl PipelineRunner {
    /// Create a runner that reports progress to `sink`
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self::with_reporter(ProgressReporter::new(sink))
    }

    /// Create a runner without progress reporting
    pub fn silent() -> Self {
        Self::with_reporter(ProgressReporter::silent())
    }

    fn with_reporter(reporter: ProgressReporter) -> Self {
        Self {
            reporter,
            controller: CancellationController::new(),
            grace_period: ProcessSupervisor::DEFAULT_GRACE_PERIOD,
            command_runner: None,
        }
    }

    /// Grace period between SIGTERM and SIGKILL for stopped processes
    ///
    /// Only used by the built-in supervisor; a runner given to
    /// [`with_command_runner`](Self::with_command_runner) keeps its own.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Replace the process supervisor
    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.command_runner = Some(runner);
        self
    }

    fn command_runner(&self) -> Arc<dyn CommandRunner> {
        match &self.command_runner {
            Some(runner) => runner.clone(),
            None => Arc::new(ProcessSupervisor::new().with_grace_period(self.grace_period)),
        }
    }

    /// Handle for stopping this runner's run
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            controller: self.controller.clone(),
            reporter: self.reporter.clone(),
        }
    }

    /// Load a definition file and run it
    ///
    /// The file's directory becomes the working directory and its path is
    /// recorded in the report.
    pub async fn run_file(&self, path: &Path, options: &RunOptions) -> RunOutcome {
        let path = match absolute(path) {
            Ok(path) => path,
            Err(e) => return self.abort(format!("Error loading {}: {}", path.display(), e)),
        };

        let definition = match PipelineDefinition::from_file(&path) {
            Ok(definition) => definition,
            Err(e) => return self.abort(format!("Error loading {}: {}", path.display(), e)),
        };

        let working_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        self.execute(&definition, &working_dir, options, Some(path)).await
    }

    /// Run a definition in `working_dir`
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        working_dir: &Path,
        options: &RunOptions,
    ) -> RunOutcome {
        self.execute(definition, working_dir, options, None).await
    }

    async fn execute(
        &self,
        definition: &PipelineDefinition,
        working_dir: &Path,
        options: &RunOptions,
        pipeline_file: Option<PathBuf>,
    ) -> RunOutcome {
        let validation = PipelineValidator::validate(definition);
        if !validation.is_valid() {
            return self.abort(format!("Invalid pipeline: {}", validation.errors.join("; ")));
        }
        for warning in &validation.warnings {
            warn!("{}", warning);
        }

        if !working_dir.is_dir() {
            return self.abort(format!(
                "Working directory not found: {}",
                working_dir.display()
            ));
        }

        let start = Instant::now();
        let start_time = chrono::Local::now().naive_local();

        info!("Starting pipeline: {}", display_name(definition));
        self.reporter.emit(
            ProgressEvent::new(EventKind::PipelineStart)
                .with_message(format!("Starting pipeline: {}", display_name(definition))),
        );

        let mut env = definition.env.clone();
        env.extend(options.env_overrides.clone());
        let context = StepContext::new(env, working_dir.to_path_buf());

        let executor = StepExecutor::new(
            self.command_runner(),
            self.reporter.clone(),
            self.controller.clone(),
        );
        let phases = PhaseRunner::new(
            executor,
            self.reporter.clone(),
            self.controller.clone(),
            options.continue_on_error,
        );

        let mut steps = Vec::new();
        let mut failed = false;

        if !definition.parallel_steps.is_empty() {
            if options.parallel {
                let outcome = phases.run_concurrent(&definition.parallel_steps, &context).await;
                failed |= outcome.failed;
                steps.extend(outcome.results);
            } else {
                info!(
                    "Skipping {} parallel steps (parallel execution not requested)",
                    definition.parallel_steps.len()
                );
            }
        }

        if !definition.steps.is_empty() && (!failed || options.continue_on_error) {
            let outcome = phases.run_sequential(&definition.steps, &context, false).await;
            failed |= outcome.failed;
            steps.extend(outcome.results);
        }

        if !definition.cleanup_steps.is_empty() {
            let outcome = phases
                .run_sequential(&definition.cleanup_steps, &context, true)
                .await;
            steps.extend(outcome.results);
        }

        // Cancelled steps are not failures; only an `error` outside cleanup is
        let stopped = self.controller.stop_reason() == Some(StopReason::UserRequested);
        let success = !failed;

        let report = PipelineRunReport {
            pipeline_file,
            start_time,
            duration: start.elapsed(),
            steps,
            success,
        };

        let report_path = match ReportWriter::for_working_dir(working_dir).write(&report).await {
            Ok(path) => {
                self.reporter.emit(
                    ProgressEvent::new(EventKind::ReportSaved).with_message(path.display().to_string()),
                );
                Some(path)
            }
            Err(e) => {
                error!("Error saving the report: {}", e);
                self.reporter
                    .emit(ProgressEvent::new(EventKind::ReportError).with_error(e.to_string()));
                None
            }
        };

        let message = if stopped {
            warn!("Pipeline stopped before completion");
            "Pipeline stopped"
        } else if success {
            info!("Pipeline completed successfully");
            "Pipeline completed successfully"
        } else {
            error!("Pipeline completed with errors");
            "Pipeline completed with errors"
        };
        self.reporter.emit(
            ProgressEvent::new(EventKind::PipelineFinished)
                .with_duration(report.duration)
                .with_message(message),
        );

        RunOutcome {
            success,
            report: Some(report),
            report_path,
        }
    }

    fn abort(&self, message: String) -> RunOutcome {
        error!("{}", message);
        self.reporter
            .emit(ProgressEvent::new(EventKind::PipelineError).with_error(message));
        RunOutcome::aborted()
    }
}

fn display_name(definition: &PipelineDefinition) -> &str {
    if definition.name.is_empty() {
        "unnamed"
    } else {
        &definition.name
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
