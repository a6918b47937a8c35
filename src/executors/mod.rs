// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Step executors
//!
//! This module turns one step into one [`StepResult`]: commands are
//! classified, launched through a [`CommandRunner`] and aggregated by the
//! [`StepExecutor`].

mod command;
mod shell;
mod step;

pub use command::CommandLine;
pub use shell::{CommandOutput, CommandRequest, CommandRunner, ProcessSupervisor};
pub use step::{StepContext, StepExecutor};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::utils::format::duration_secs;

/// Final status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of one step execution
///
/// Built once by the executor and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name
    #[serde(rename = "step")]
    pub name: String,

    pub status: StepStatus,

    /// Wall-clock time spent in the step
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Stdout of every command that ran, newline-joined
    #[serde(default)]
    pub output: Option<String>,

    /// Stderr of the failing command, or a description of the failure
    #[serde(default)]
    pub error: Option<String>,

    /// Exit code of the failing command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl StepResult {
    /// Create a successful result
    pub fn success(name: &str, duration: Duration, output: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Success,
            duration,
            output,
            error: None,
            exit_code: None,
        }
    }

    /// Create a failed result
    pub fn error(name: &str, duration: Duration, output: Option<String>, error: String) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Error,
            duration,
            output,
            error: Some(error),
            exit_code: None,
        }
    }

    /// Create a cancelled result
    pub fn cancelled(name: &str, duration: Duration, output: Option<String>, error: String) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Cancelled,
            duration,
            output,
            error: Some(error),
            exit_code: None,
        }
    }

    /// Attach the exit code of the command that failed
    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == StepStatus::Error
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == StepStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_shape() {
        let result = StepResult::error(
            "build",
            Duration::from_millis(2340),
            Some("compiling".into()),
            "boom".into(),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["step"], "build");
        assert_eq!(json["status"], "error");
        assert_eq!(json["duration"], "2.34s");
        assert_eq!(json["output"], "compiling");
        assert_eq!(json["error"], "boom");
        assert!(json.get("exit_code").is_none());
    }

    #[test]
    fn test_success_serializes_null_error() {
        let result = StepResult::success("lint", Duration::ZERO, None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["error"].is_null());
        assert!(json["output"].is_null());
        assert!(result.is_success());
    }
}
