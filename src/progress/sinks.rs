// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Sinks shipped with the crate

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{EventKind, ProgressEvent, ProgressSink};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rolling, human-readable log of a run
///
/// Keeps the newest [`LogBuffer::DEFAULT_CAPACITY`] lines and drops the
/// oldest first.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Render one event as a log line
    pub fn format_event(event: &ProgressEvent) -> String {
        match &event.message {
            Some(message) => format!(
                "[{}] {}: {}",
                event.timestamp,
                event.step.as_deref().unwrap_or("Pipeline"),
                message
            ),
            None => format!(
                "[{}] {}: {}",
                event.timestamp,
                event.event,
                event.step.as_deref().unwrap_or("")
            ),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = lock(&self.lines);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Snapshot of the retained lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for LogBuffer {
    fn emit(&self, event: &ProgressEvent) {
        self.push(Self::format_event(event));
    }
}

/// Records every event; used by tests and embedders that inspect a run
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        lock(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(|e| e.event).collect()
    }

    /// Events about one step, in emission order
    pub fn events_for(&self, step: &str) -> Vec<ProgressEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.step.as_deref() == Some(step))
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events).iter().filter(|e| e.event == kind).count()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, event: &ProgressEvent) {
        lock(&self.events).push(event.clone());
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        let step = event.step.as_deref().unwrap_or("-");
        match event.event {
            EventKind::StepOutput => {
                tracing::debug!(step, output = event.output.as_deref().unwrap_or(""), "step output")
            }
            EventKind::StepError | EventKind::StepFailure | EventKind::ReportError => {
                tracing::warn!(
                    step,
                    error = event.error.as_deref().unwrap_or(""),
                    "{}",
                    event.event
                )
            }
            EventKind::PipelineError | EventKind::PipelineHalted => {
                tracing::error!(step, message = event.message.as_deref().unwrap_or(""), "{}", event.event)
            }
            _ => tracing::info!(
                step,
                duration = event.duration.as_deref().unwrap_or(""),
                message = event.message.as_deref().unwrap_or(""),
                "{}",
                event.event
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_buffer_formats_messages() {
        let event = ProgressEvent::for_step(EventKind::StepStart, "build");
        let line = LogBuffer::format_event(&event);
        assert_eq!(line, format!("[{}] step_start: build", event.timestamp));

        let event = ProgressEvent::new(EventKind::PipelineStart).with_message("Starting web-app");
        let line = LogBuffer::format_event(&event);
        assert_eq!(line, format!("[{}] Pipeline: Starting web-app", event.timestamp));
    }

    #[test]
    fn test_log_buffer_keeps_newest_hundred() {
        let buffer = LogBuffer::new();
        for i in 0..150 {
            buffer.push(format!("line {i}"));
        }

        let lines = buffer.lines();
        assert_eq!(lines.len(), 100);
        assert_eq!(lines.first().unwrap(), "line 50");
        assert_eq!(lines.last().unwrap(), "line 149");
    }

    #[test]
    fn test_log_buffer_as_sink() {
        let buffer = LogBuffer::with_capacity(2);
        buffer.emit(&ProgressEvent::for_step(EventKind::StepStart, "a"));
        buffer.emit(&ProgressEvent::for_step(EventKind::StepStart, "b"));
        buffer.emit(&ProgressEvent::for_step(EventKind::StepStart, "c"));

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("step_start: b"));
        assert!(lines[1].ends_with("step_start: c"));
    }

    #[test]
    fn test_tracing_sink_levels() {
        let logs = crate::progress::test_support::captured_logs(|| {
            TracingSink.emit(&ProgressEvent::for_step(EventKind::StepStart, "build"));
            TracingSink.emit(
                &ProgressEvent::for_step(EventKind::StepFailure, "build").with_error("exit 2"),
            );
            TracingSink.emit(
                &ProgressEvent::new(EventKind::PipelineHalted).with_message("Error in parallel step: lint"),
            );
        });

        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("INFO") && lines[0].contains("step_start"));
        assert!(lines[1].contains("WARN") && lines[1].contains("exit 2"));
        assert!(lines[2].contains("ERROR") && lines[2].contains("Error in parallel step: lint"));
    }

    #[test]
    fn test_memory_sink_filters_by_step() {
        let sink = MemorySink::new();
        sink.emit(&ProgressEvent::for_step(EventKind::StepStart, "a"));
        sink.emit(&ProgressEvent::for_step(EventKind::StepStart, "b"));
        sink.emit(&ProgressEvent::for_step(EventKind::StepSuccess, "a"));

        let kinds: Vec<_> = sink.events_for("a").iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::StepStart, EventKind::StepSuccess]);
        assert_eq!(sink.count(EventKind::StepStart), 2);
    }
}
