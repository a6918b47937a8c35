// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Console progress output
//!
//! Renders progress events as colored lines above an indicatif bar that
//! counts finished steps.

use colored::Colorize;
use indicatif::ProgressBar;
use std::io::IsTerminal;

use crate::progress::{EventKind, ProgressEvent, ProgressSink, TracingSink};
use crate::executors::StepStatus;
use crate::utils::{
    create_hidden_bar, create_step_bar, dimmed, error, status_symbol, success, warning,
};

/// Progress sink for interactive runs
pub struct ConsoleSink {
    bar: ProgressBar,
    verbose: bool,
    /// Also forward every event to the log
    event_log: Option<TracingSink>,
}

impl ConsoleSink {
    /// Create a sink expecting `total_steps` terminal step events
    pub fn new(total_steps: u64, verbose: bool) -> Self {
        let bar = if std::io::stderr().is_terminal() {
            create_step_bar(total_steps)
        } else {
            create_hidden_bar(total_steps)
        };

        Self {
            bar,
            verbose,
            event_log: None,
        }
    }

    /// Mirror events into the tracing log (set when a log level is given)
    pub fn with_event_log(mut self, enabled: bool) -> Self {
        self.event_log = enabled.then_some(TracingSink);
        self
    }

    fn print(&self, line: String) {
        self.bar.suspend(|| println!("{}", line));
    }

    fn print_block(&self, text: &str, style: fn(&str) -> colored::ColoredString) {
        for line in text.trim_end().lines() {
            self.print(format!("      {}", style(line)));
        }
    }

    fn step_line(&self, symbol: colored::ColoredString, event: &ProgressEvent, suffix: &str) {
        let step = event.step.as_deref().unwrap_or("?");
        let duration = event
            .duration
            .as_deref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        self.print(format!(
            "  {} {}{}{}",
            symbol,
            step.bold(),
            dimmed(&duration),
            suffix
        ));
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Some(log) = &self.event_log {
            self.bar.suspend(|| log.emit(event));
        }

        if event.event.is_step_terminal() {
            self.bar.inc(1);
        }

        match event.event {
            EventKind::PipelineStart => {
                let message = event.message.as_deref().unwrap_or("Starting pipeline");
                self.print(format!("{}", message.bold()));
            }
            EventKind::ParallelStart => self.print(format!("\n{}:", "Parallel steps".bold())),
            EventKind::SequentialStart => self.print(format!("\n{}:", "Steps".bold())),
            EventKind::CleanupStart => self.print(format!("\n{}:", "Cleanup".bold())),
            EventKind::ParallelEnd | EventKind::SequentialEnd | EventKind::CleanupEnd => {}
            EventKind::StepStart => {
                if let Some(step) = &event.step {
                    self.bar.set_message(step.clone());
                    if self.verbose {
                        self.print(format!("  {} {}", "•".blue(), step));
                    }
                }
            }
            EventKind::StepOutput => {
                if let (true, Some(output)) = (self.verbose, &event.output) {
                    self.print_block(output, dimmed);
                }
            }
            EventKind::StepError => {
                if let (true, Some(stderr)) = (self.verbose, &event.error) {
                    self.print_block(stderr, warning);
                }
            }
            EventKind::StepSuccess => {
                self.step_line(status_symbol(StepStatus::Success), event, "")
            }
            EventKind::StepFailure => {
                self.step_line(status_symbol(StepStatus::Error), event, "");
                if let Some(err) = &event.error {
                    self.print_block(err, error);
                }
            }
            EventKind::StepCancelled => {
                self.step_line(
                    status_symbol(StepStatus::Cancelled),
                    event,
                    &format!(" {}", warning("cancelled")),
                )
            }
            EventKind::PipelineHalted => {
                let message = event.message.as_deref().unwrap_or("Pipeline halted");
                self.print(format!("  {} {}", "⚠".yellow(), warning(message)));
            }
            EventKind::PipelineStopped => {
                self.print(format!(
                    "\n{} {}",
                    "⚠".yellow(),
                    warning("Stop requested: terminating running steps, cleanup will still run")
                ));
            }
            EventKind::ReportSaved => {
                if let Some(path) = &event.message {
                    self.print(format!("\n{} {}", dimmed("Report:"), path));
                }
            }
            EventKind::ReportError => {
                let err = event.error.as_deref().unwrap_or("unknown error");
                self.print(format!(
                    "\n{} {}",
                    "⚠".yellow(),
                    warning(&format!("Could not save report: {}", err))
                ));
            }
            EventKind::PipelineFinished => {
                self.bar.finish_and_clear();
                let message = event.message.as_deref().unwrap_or("Pipeline finished");
                let duration = event.duration.as_deref().unwrap_or("");
                let styled = if message.contains("successfully") {
                    success(message).bold()
                } else {
                    error(message).bold()
                };
                self.print(format!("{} {}", styled, dimmed(&format!("in {}", duration))));
            }
            EventKind::PipelineError => {
                self.bar.finish_and_clear();
                let err = event.error.as_deref().unwrap_or("Pipeline error");
                self.print(format!("{} {}", "✗".red(), error(err).bold()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::test_support::captured_logs;

    #[test]
    fn test_event_log_is_off_by_default() {
        let sink = ConsoleSink::new(1, false);
        let logs = captured_logs(|| {
            sink.emit(&ProgressEvent::for_step(EventKind::StepStart, "build"))
        });
        assert!(logs.is_empty());
    }

    #[test]
    fn test_event_log_mirrors_events() {
        let sink = ConsoleSink::new(1, false).with_event_log(true);
        let logs = captured_logs(|| {
            sink.emit(
                &ProgressEvent::for_step(EventKind::StepFailure, "build").with_error("exit 2"),
            )
        });
        assert!(logs.contains("step_failure"));
        assert!(logs.contains("build"));
        assert!(logs.contains("exit 2"));
    }
}
