// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Phase runners
//!
//! The concurrent phase spawns one task per step and records results in
//! completion order. The sequential and cleanup phases run steps one after
//! another on the calling task.

use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::StepSpec;
use crate::cancel::CancellationController;
use crate::executors::{StepContext, StepExecutor, StepResult};
use crate::progress::{EventKind, ProgressEvent, ProgressReporter};

/// Results of one phase
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    pub results: Vec<StepResult>,
    /// At least one step ended in `error`
    pub failed: bool,
    /// The phase stopped issuing or recording work because of a failure
    pub halted: bool,
}

/// Runs the phases of a pipeline
pub struct PhaseRunner {
    executor: StepExecutor,
    reporter: ProgressReporter,
    controller: CancellationController,
    continue_on_error: bool,
}

impl PhaseRunner {
    pub fn new(
        executor: StepExecutor,
        reporter: ProgressReporter,
        controller: CancellationController,
        continue_on_error: bool,
    ) -> Self {
        Self {
            executor,
            reporter,
            controller,
            continue_on_error,
        }
    }

    /// Run every step at once, one task each
    ///
    /// On the first `error` (without continue-on-error) the run is halted:
    /// running processes are terminated and results that arrive afterwards
    /// are discarded.
    pub async fn run_concurrent(&self, steps: &[StepSpec], context: &StepContext) -> PhaseOutcome {
        info!("Starting parallel execution of {} steps", steps.len());
        self.reporter.emit(
            ProgressEvent::new(EventKind::ParallelStart)
                .with_message(format!("Running {} steps in parallel", steps.len())),
        );

        let mut workers: FuturesUnordered<_> = steps
            .iter()
            .map(|step| {
                let executor = self.executor.clone();
                let context = context.clone();
                let name = step.name.clone();
                let step = step.clone();
                let handle =
                    tokio::spawn(async move { executor.execute(&step, &context, false).await });
                async move { (name, handle.await) }
            })
            .collect();

        let mut outcome = PhaseOutcome::default();
        let mut abandoned = Vec::new();

        while let Some((name, joined)) = workers.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Parallel step {} panicked: {}", name, e);
                    let message = format!("Step task failed: {}", e);
                    self.reporter.emit(
                        ProgressEvent::for_step(EventKind::StepFailure, &name).with_error(message.clone()),
                    );
                    StepResult::error(&name, Duration::ZERO, None, message)
                }
            };

            if outcome.halted {
                debug!("Discarding result of {} ({}) after halt", name, result.status);
                abandoned.push(name);
                continue;
            }

            let is_error = result.is_error();
            outcome.results.push(result);

            if is_error {
                outcome.failed = true;
                if !self.continue_on_error {
                    error!("Stopping pipeline due to error in parallel step: {}", name);
                    outcome.halted = true;
                    self.reporter.emit(
                        ProgressEvent::for_step(EventKind::PipelineHalted, &name)
                            .with_message(format!("Error in parallel step: {}", name)),
                    );
                    self.controller.halt(&name);
                }
            }
        }

        if !abandoned.is_empty() {
            warn!("Abandoned parallel steps after halt: {}", abandoned.join(", "));
        }

        self.reporter.emit(ProgressEvent::new(EventKind::ParallelEnd));
        outcome
    }

    /// Run steps in order
    ///
    /// With `is_cleanup` every step runs regardless of stop requests or
    /// earlier failures, and failures are only logged.
    pub async fn run_sequential(
        &self,
        steps: &[StepSpec],
        context: &StepContext,
        is_cleanup: bool,
    ) -> PhaseOutcome {
        let (start, end) = if is_cleanup {
            (EventKind::CleanupStart, EventKind::CleanupEnd)
        } else {
            (EventKind::SequentialStart, EventKind::SequentialEnd)
        };

        info!(
            "Starting {} execution of {} steps",
            if is_cleanup { "cleanup" } else { "sequential" },
            steps.len()
        );
        self.reporter.emit(ProgressEvent::new(start));

        let mut outcome = PhaseOutcome::default();

        for step in steps {
            if !is_cleanup && self.controller.is_stop_requested() {
                info!("Stop requested, not starting step {}", step.name);
                break;
            }

            let result = self.executor.execute(step, context, is_cleanup).await;
            let is_error = result.is_error();
            outcome.results.push(result);

            if !is_error {
                continue;
            }

            if is_cleanup {
                warn!("Cleanup step {} failed", step.name);
                continue;
            }

            outcome.failed = true;
            if !self.continue_on_error {
                error!("Stopping pipeline due to error in step: {}", step.name);
                outcome.halted = true;
                self.reporter.emit(
                    ProgressEvent::for_step(EventKind::PipelineHalted, &step.name)
                        .with_message(format!("Error in step: {}", step.name)),
                );
                break;
            }
        }

        self.reporter.emit(ProgressEvent::new(end));
        outcome
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executors::{ProcessSupervisor, StepStatus};
    use crate::progress::MemorySink;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(continue_on_error: bool) -> (PhaseRunner, MemorySink, CancellationController) {
        let sink = MemorySink::new();
        let reporter = ProgressReporter::new(Arc::new(sink.clone()));
        let controller = CancellationController::new();
        let supervisor = ProcessSupervisor::new().with_grace_period(Duration::from_secs(1));
        let executor = StepExecutor::new(Arc::new(supervisor), reporter.clone(), controller.clone());
        (
            PhaseRunner::new(executor, reporter, controller.clone(), continue_on_error),
            sink,
            controller,
        )
    }

    fn context(dir: &TempDir) -> StepContext {
        StepContext::new(HashMap::new(), dir.path().to_path_buf())
    }

    fn names(outcome: &PhaseOutcome) -> Vec<&str> {
        outcome.results.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_concurrent_results_in_completion_order() {
        let dir = TempDir::new().unwrap();
        let (runner, sink, _) = setup(false);
        let steps = vec![
            StepSpec::new("slow", ["sleep 1"]),
            StepSpec::new("fast", ["true"]),
        ];

        let outcome = runner.run_concurrent(&steps, &context(&dir)).await;

        assert_eq!(names(&outcome), vec!["fast", "slow"]);
        assert!(!outcome.failed);
        assert_eq!(sink.kinds().first(), Some(&EventKind::ParallelStart));
        assert_eq!(sink.kinds().last(), Some(&EventKind::ParallelEnd));
    }

    #[tokio::test]
    async fn test_concurrent_failure_halts() {
        let dir = TempDir::new().unwrap();
        let (runner, sink, controller) = setup(false);
        let steps = vec![
            StepSpec::new("a", ["sleep 5"]),
            StepSpec::new("b", ["false"]),
            StepSpec::new("c", ["true"]),
        ];

        let outcome = runner.run_concurrent(&steps, &context(&dir)).await;

        assert!(outcome.failed);
        assert!(outcome.halted);
        assert!(outcome.results.len() <= 3);
        let b = outcome.results.iter().find(|r| r.name == "b").unwrap();
        assert_eq!(b.status, StepStatus::Error);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.name == "b" || r.status != StepStatus::Error));

        let halted = sink
            .events()
            .into_iter()
            .find(|e| e.event == EventKind::PipelineHalted)
            .unwrap();
        assert_eq!(halted.step.as_deref(), Some("b"));
        assert_eq!(
            controller.stop_reason(),
            Some(crate::cancel::StopReason::Halted { step: "b".into() })
        );
    }

    #[tokio::test]
    async fn test_concurrent_continue_on_error_runs_all() {
        let dir = TempDir::new().unwrap();
        let (runner, sink, controller) = setup(true);
        let steps = vec![
            StepSpec::new("a", ["true"]),
            StepSpec::new("b", ["false"]),
            StepSpec::new("c", ["false"]),
        ];

        let outcome = runner.run_concurrent(&steps, &context(&dir)).await;

        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.failed);
        assert!(!outcome.halted);
        assert!(!controller.is_stop_requested());
        assert_eq!(sink.count(EventKind::PipelineHalted), 0);
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_error() {
        let dir = TempDir::new().unwrap();
        let (runner, _, _) = setup(false);
        let steps = vec![
            StepSpec::new("one", ["true"]),
            StepSpec::new("two", ["false"]),
            StepSpec::new("three", ["true"]),
        ];

        let outcome = runner.run_sequential(&steps, &context(&dir), false).await;

        assert_eq!(names(&outcome), vec!["one", "two"]);
        assert_eq!(outcome.results.last().unwrap().status, StepStatus::Error);
        assert!(outcome.halted);
    }

    #[tokio::test]
    async fn test_sequential_skips_after_stop() {
        let dir = TempDir::new().unwrap();
        let (runner, sink, controller) = setup(false);
        controller.request_stop();

        let steps = vec![StepSpec::new("one", ["true"])];
        let outcome = runner.run_sequential(&steps, &context(&dir), false).await;

        assert!(outcome.results.is_empty());
        assert_eq!(sink.kinds(), vec![EventKind::SequentialStart, EventKind::SequentialEnd]);
    }

    #[tokio::test]
    async fn test_cleanup_runs_everything() {
        let dir = TempDir::new().unwrap();
        let (runner, sink, controller) = setup(false);
        controller.request_stop();

        let steps = vec![
            StepSpec::new("broken", ["false"]),
            StepSpec::new("tidy", ["echo tidy"]),
        ];
        let outcome = runner.run_sequential(&steps, &context(&dir), true).await;

        assert_eq!(names(&outcome), vec!["broken", "tidy"]);
        assert!(!outcome.halted);
        assert_eq!(outcome.results[1].output.as_deref(), Some("tidy"));
        assert_eq!(sink.kinds().first(), Some(&EventKind::CleanupStart));
        assert_eq!(sink.count(EventKind::PipelineHalted), 0);
    }
}
