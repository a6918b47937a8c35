// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline definitions and execution
//!
//! This module defines the three-phase pipeline data model, validates it and
//! runs it: concurrent steps, sequential steps, then cleanup.

mod definition;
mod phases;
mod runner;
mod validation;

pub use definition::*;
pub use phases::{PhaseOutcome, PhaseRunner};
pub use runner::{PipelineRunner, RunOptions, RunOutcome, StopHandle};
pub use validation::{PipelineValidator, ValidationResult};
