// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Error types
//!
//! Step failures never surface as errors: they become part of a
//! [`StepResult`](crate::executors::StepResult). The variants here cover the
//! things that can go wrong around a run (loading a definition, launching a
//! process, persisting a report).

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipewright operations
pub type PipewrightResult<T> = Result<T, PipewrightError>;

/// Main error type for pipewright
#[derive(Error, Debug, Diagnostic)]
pub enum PipewrightError {
    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(pipewright::pipeline_not_found),
        help("Pass the definition with '--pipeline <FILE>' (default: pipeline.yml)")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(pipewright::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid environment variable '{entry}'")]
    #[diagnostic(
        code(pipewright::invalid_env),
        help("Use KEY=VALUE format, e.g. '-e APP_ENV=ci'")
    )]
    InvalidEnvVar { entry: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to launch '{command}': {error}")]
    #[diagnostic(code(pipewright::launch_failed))]
    LaunchFailed {
        command: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Command is empty")]
    #[diagnostic(
        code(pipewright::empty_command),
        help("Every entry under 'commands' must contain a program to run")
    )]
    EmptyCommand,

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipewright::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pipewright::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(pipewright::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipewright::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pipewright::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for PipewrightError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipewrightError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipewrightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl PipewrightError {
    /// Create a launch error with a hint derived from the OS error
    pub fn launch_failed(command: &str, error: &std::io::Error) -> Self {
        let help = match error.kind() {
            std::io::ErrorKind::NotFound => Some(
                "The program was not found on PATH. Check the spelling or install it.".to_string(),
            ),
            std::io::ErrorKind::PermissionDenied => {
                Some("The program exists but is not executable (chmod +x?).".to_string())
            }
            _ => None,
        };

        Self::LaunchFailed {
            command: command.to_string(),
            error: error.to_string(),
            help,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failed_not_found_has_help() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let err = PipewrightError::launch_failed("nope --version", &io);

        match err {
            PipewrightError::LaunchFailed { command, help, .. } => {
                assert_eq!(command, "nope --version");
                assert!(help.unwrap().contains("PATH"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_yaml_error_converts() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{not: [a list").unwrap_err();
        let err: PipewrightError = yaml_err.into();
        assert!(err.to_string().starts_with("YAML parsing error"));
    }
}
