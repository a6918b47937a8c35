// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Step executor
//!
//! Runs the commands of one step in order and folds them into a single
//! [`StepResult`]. Nothing that happens inside a step escapes as an error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{CommandRequest, CommandRunner, StepResult};
use crate::cancel::CancellationController;
use crate::pipeline::StepSpec;
use crate::progress::{EventKind, ProgressEvent, ProgressReporter};

/// Environment and directory shared by every step of a run
#[derive(Debug, Clone)]
pub struct StepContext {
    pub env: Arc<HashMap<String, String>>,
    pub working_dir: Arc<PathBuf>,
}

impl StepContext {
    pub fn new(env: HashMap<String, String>, working_dir: PathBuf) -> Self {
        Self {
            env: Arc::new(env),
            working_dir: Arc::new(working_dir),
        }
    }
}

/// Executes steps; cheap to clone into worker tasks
#[derive(Clone)]
pub struct StepExecutor {
    runner: Arc<dyn CommandRunner>,
    reporter: ProgressReporter,
    controller: CancellationController,
}

impl StepExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        reporter: ProgressReporter,
        controller: CancellationController,
    ) -> Self {
        Self {
            runner,
            reporter,
            controller,
        }
    }

    /// Execute a step
    ///
    /// Cleanup steps skip the stop-flag check and their commands are never
    /// terminated by a stop request.
    pub async fn execute(&self, step: &StepSpec, context: &StepContext, is_cleanup: bool) -> StepResult {
        let name = step.name.as_str();
        let start = Instant::now();

        info!("Executing step: {}", name);
        self.reporter
            .emit(ProgressEvent::for_step(EventKind::StepStart, name));

        if step.commands.is_empty() {
            let message = format!("Step {} has no commands defined", name);
            error!("{}", message);
            return self.fail(StepResult::error(name, start.elapsed(), None, message));
        }

        let total = step.commands.len();
        let mut outputs: Vec<String> = Vec::new();

        for (i, command) in step.commands.iter().enumerate() {
            if !is_cleanup && self.controller.is_stop_requested() {
                warn!("Step {} cancelled before command {}/{}", name, i + 1, total);
                return self.cancel(StepResult::cancelled(
                    name,
                    start.elapsed(),
                    joined(&outputs),
                    "Cancelled by stop request".to_string(),
                ));
            }

            if total > 1 {
                info!("Running command {}/{} in {}: {}", i + 1, total, name, command);
                self.reporter.emit(
                    ProgressEvent::for_step(EventKind::StepOutput, name)
                        .with_output(format!(">>> Command {}/{}: {}", i + 1, total, command)),
                );
            }

            let request = CommandRequest {
                step: name,
                command,
                env: &context.env,
                working_dir: &context.working_dir,
                controller: &self.controller,
                cancellable: !is_cleanup,
            };

            let output = match self.runner.run(request).await {
                Ok(output) => output,
                Err(e) => {
                    error!("Failed to launch command in {}: {}", name, e);
                    self.reporter.emit(
                        ProgressEvent::for_step(EventKind::StepError, name).with_error(e.to_string()),
                    );
                    return self.fail(StepResult::error(
                        name,
                        start.elapsed(),
                        joined(&outputs),
                        e.to_string(),
                    ));
                }
            };

            if !output.stdout.trim().is_empty() {
                self.reporter.emit(
                    ProgressEvent::for_step(EventKind::StepOutput, name).with_output(output.stdout.clone()),
                );
                outputs.push(output.stdout.trim().to_string());
            }

            if output.terminated {
                warn!("Command in {} was terminated by a stop request", name);
                return self.cancel(StepResult::cancelled(
                    name,
                    start.elapsed(),
                    joined(&outputs),
                    format!("Command '{}' was terminated by a stop request", command),
                ));
            }

            if !output.success() {
                let stderr = output.stderr.trim();
                if !stderr.is_empty() {
                    self.reporter.emit(
                        ProgressEvent::for_step(EventKind::StepError, name).with_error(output.stderr.clone()),
                    );
                }

                let message = if stderr.is_empty() {
                    match output.exit_code {
                        Some(code) => format!("command '{}' exited with code {}", command, code),
                        None => format!("command '{}' was killed by a signal", command),
                    }
                } else {
                    stderr.to_string()
                };

                error!(
                    "Command {}/{} in {} failed (exit code {:?})",
                    i + 1,
                    total,
                    name,
                    output.exit_code
                );
                return self.fail(
                    StepResult::error(name, start.elapsed(), joined(&outputs), message)
                        .with_exit_code(output.exit_code.or(Some(-1))),
                );
            }
        }

        let result = StepResult::success(name, start.elapsed(), joined(&outputs));
        info!("Step {} completed in {:.2}s", name, result.duration.as_secs_f64());
        self.reporter.emit(
            ProgressEvent::for_step(EventKind::StepSuccess, name)
                .with_duration(result.duration)
                .with_message(format!("Completed in {:.2}s", result.duration.as_secs_f64())),
        );
        result
    }

    fn fail(&self, result: StepResult) -> StepResult {
        let mut event = ProgressEvent::for_step(EventKind::StepFailure, &result.name)
            .with_duration(result.duration);
        if let Some(error) = &result.error {
            event = event.with_error(error.clone());
        }
        self.reporter.emit(event);
        result
    }

    fn cancel(&self, result: StepResult) -> StepResult {
        self.reporter.emit(
            ProgressEvent::for_step(EventKind::StepCancelled, &result.name)
                .with_duration(result.duration)
                .with_message("Cancelled"),
        );
        result
    }
}

fn joined(outputs: &[String]) -> Option<String> {
    if outputs.is_empty() {
        None
    } else {
        Some(outputs.join("\n"))
    }
}
