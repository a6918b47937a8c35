// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! # pipewright - three-phase shell pipeline runner
//!
//! `pipewright` runs a declarative pipeline of named shell steps in three
//! phases: an optional concurrent phase, a sequential phase and an
//! always-run cleanup phase.
//!
//! ## Features
//!
//! - **Concurrent steps** - one task per step, results in completion order
//! - **Cooperative stop** - running processes get SIGTERM, then SIGKILL
//! - **Guaranteed cleanup** - cleanup runs after failures and stop requests
//! - **Progress events** - every state change goes to a single sink
//! - **JSON reports** - each run is saved under `reports/`
//!
//! ## Quick Start
//!
//! ```bash
//! # Run ./pipeline.yml, parallel steps included
//! pipewright run --parallel
//!
//! # Check a definition
//! pipewright validate pipeline.yml
//!
//! # Summarize recent runs
//! pipewright history
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use pipewright::pipeline::{PipelineRunner, RunOptions};
//! use pipewright::progress::LogBuffer;
//!
//! # async fn demo() {
//! let log = Arc::new(LogBuffer::new());
//! let runner = PipelineRunner::new(log.clone());
//! let outcome = runner
//!     .run_file(Path::new("pipeline.yml"), &RunOptions::new().parallel(true))
//!     .await;
//! println!("success: {}, {} log lines", outcome.success, log.len());
//! # }
//! ```

pub mod cancel;
pub mod cli;
pub mod errors;
pub mod executors;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use errors::{PipewrightError, PipewrightResult};
pub use executors::{StepResult, StepStatus};
pub use pipeline::{PipelineDefinition, PipelineRunner, RunOptions, RunOutcome, StepSpec, StopHandle};
pub use progress::{EventKind, ProgressEvent, ProgressSink};
pub use report::PipelineRunReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
