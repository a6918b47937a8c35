// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Progress events
//!
//! The engine describes everything it does as a stream of [`ProgressEvent`]s
//! handed to a single [`ProgressSink`]. Sinks are called from several tasks at
//! once during the concurrent phase; any state they keep is theirs to guard.

mod sinks;

pub use sinks::{LogBuffer, MemorySink, TracingSink};

#[cfg(test)]
pub(crate) mod test_support {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a debug-level subscriber and return what it logged
    pub(crate) fn captured_logs(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::format_secs;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PipelineStart,
    ParallelStart,
    ParallelEnd,
    SequentialStart,
    SequentialEnd,
    CleanupStart,
    CleanupEnd,
    StepStart,
    StepOutput,
    StepError,
    StepSuccess,
    StepFailure,
    StepCancelled,
    PipelineHalted,
    PipelineStopped,
    PipelineFinished,
    ReportSaved,
    ReportError,
    PipelineError,
}

impl EventKind {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStart => "pipeline_start",
            Self::ParallelStart => "parallel_start",
            Self::ParallelEnd => "parallel_end",
            Self::SequentialStart => "sequential_start",
            Self::SequentialEnd => "sequential_end",
            Self::CleanupStart => "cleanup_start",
            Self::CleanupEnd => "cleanup_end",
            Self::StepStart => "step_start",
            Self::StepOutput => "step_output",
            Self::StepError => "step_error",
            Self::StepSuccess => "step_success",
            Self::StepFailure => "step_failure",
            Self::StepCancelled => "step_cancelled",
            Self::PipelineHalted => "pipeline_halted",
            Self::PipelineStopped => "pipeline_stopped",
            Self::PipelineFinished => "pipeline_finished",
            Self::ReportSaved => "report_saved",
            Self::ReportError => "report_error",
            Self::PipelineError => "pipeline_error",
        }
    }

    /// Whether this event ends a step
    pub fn is_step_terminal(&self) -> bool {
        matches!(
            self,
            Self::StepSuccess | Self::StepFailure | Self::StepCancelled
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event: EventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
}

impl ProgressEvent {
    /// Create an event stamped with the current local time
    pub fn new(event: EventKind) -> Self {
        Self {
            event,
            step: None,
            message: None,
            duration: None,
            error: None,
            output: None,
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }

    /// Create an event about a step
    pub fn for_step(event: EventKind, step: &str) -> Self {
        Self {
            step: Some(step.to_string()),
            ..Self::new(event)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(format_secs(duration));
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    /// Handle one event. Called concurrently from several tasks.
    fn emit(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Engine-side handle to the run's sink
///
/// A sink that panics is logged and otherwise ignored: progress reporting
/// must never take a run down.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A reporter that drops every event
    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| sink.emit(&event))).is_err() {
            tracing::error!("Progress sink panicked while handling '{}'", event.event);
        }
    }
}
