// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline definition structures
//!
//! Defines the schema for pipeline YAML files: three phases of named steps
//! plus a shared environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::{PipewrightError, PipewrightResult};

/// Pipeline definition
///
/// The runner only ever borrows a definition; nothing in the engine mutates
/// it once a run has started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name
    #[serde(default)]
    pub name: String,

    /// Pipeline description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Environment variables applied to every step
    #[serde(default, rename = "environment", alias = "env")]
    pub env: HashMap<String, String>,

    /// Steps run concurrently (only when the run asks for it)
    #[serde(default)]
    pub parallel_steps: Vec<StepSpec>,

    /// Steps run one after another, in order
    #[serde(default, rename = "pipeline", alias = "steps")]
    pub steps: Vec<StepSpec>,

    /// Steps that always run at the end
    #[serde(default, rename = "cleanup", alias = "cleanup_steps")]
    pub cleanup_steps: Vec<StepSpec>,
}

impl PipelineDefinition {
    /// Create an empty definition with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a definition from a YAML file
    pub fn from_file(path: &Path) -> PipewrightResult<Self> {
        if !path.exists() {
            return Err(PipewrightError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| PipewrightError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse a definition from a YAML string
    pub fn from_yaml(yaml: &str) -> PipewrightResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize the definition to YAML
    pub fn to_yaml(&self) -> PipewrightResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Number of steps across all three phases
    pub fn total_steps(&self) -> usize {
        self.parallel_steps.len() + self.steps.len() + self.cleanup_steps.len()
    }

    /// Builder: add a concurrent step
    pub fn with_parallel_step(mut self, step: StepSpec) -> Self {
        self.parallel_steps.push(step);
        self
    }

    /// Builder: add a sequential step
    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Builder: add a cleanup step
    pub fn with_cleanup_step(mut self, step: StepSpec) -> Self {
        self.cleanup_steps.push(step);
        self
    }

    /// Builder: set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A single named step: one or more commands run in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct StepSpec {
    /// Step name (unique within its phase by convention, not enforced)
    #[serde(rename = "step")]
    pub name: String,

    /// Step description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Commands, run in order; the first failure aborts the rest
    pub commands: Vec<String>,
}

impl StepSpec {
    /// Create a step from a name and its commands
    pub fn new<I, S>(name: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Builder: set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// On-disk step shape: accepts both `command` and `commands`
#[derive(Deserialize)]
struct RawStep {
    #[serde(alias = "name")]
    step: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    command: Option<String>,

    #[serde(default)]
    commands: Option<Commands>,
}

/// Either a single command or a list of commands
#[derive(Deserialize)]
#[serde(untagged)]
enum Commands {
    Single(String),
    Multiple(Vec<String>),
}

impl From<RawStep> for StepSpec {
    fn from(raw: RawStep) -> Self {
        let commands = match (raw.commands, raw.command) {
            (Some(Commands::Multiple(list)), _) => list,
            (Some(Commands::Single(cmd)), _) => vec![cmd],
            (None, Some(cmd)) => vec![cmd],
            (None, None) => Vec::new(),
        };

        Self {
            name: raw.step,
            description: raw.description,
            commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_phases() {
        let yaml = r#"
name: web-app
description: Build and ship
environment:
  APP_ENV: ci
parallel_steps:
  - step: lint
    command: cargo clippy
  - step: audit
    command: cargo audit
pipeline:
  - step: build
    commands:
      - cargo build
      - cargo test
cleanup:
  - step: tidy
    command: rm -rf target/tmp
"#;

        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.name, "web-app");
        assert_eq!(pipeline.env.get("APP_ENV").map(String::as_str), Some("ci"));
        assert_eq!(pipeline.parallel_steps.len(), 2);
        assert_eq!(pipeline.steps[0].commands, vec!["cargo build", "cargo test"]);
        assert_eq!(pipeline.cleanup_steps[0].name, "tidy");
        assert_eq!(pipeline.total_steps(), 4);
    }

    #[test]
    fn test_parse_aliases() {
        let yaml = r#"
name: aliases
env:
  A: "1"
steps:
  - name: only
    commands: echo hi
cleanup_steps:
  - name: after
    command: "true"
"#;

        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.env.len(), 1);
        assert_eq!(pipeline.steps[0].name, "only");
        assert_eq!(pipeline.steps[0].commands, vec!["echo hi"]);
        assert_eq!(pipeline.cleanup_steps[0].commands, vec!["true"]);
    }

    #[test]
    fn test_commands_win_over_command() {
        let yaml = r#"
pipeline:
  - step: both
    command: echo legacy
    commands: [echo new]
"#;

        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.steps[0].commands, vec!["echo new"]);
    }

    #[test]
    fn test_step_without_commands_parses_empty() {
        let yaml = r#"
pipeline:
  - step: nothing
"#;

        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap();
        assert!(pipeline.steps[0].commands.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineDefinition::from_file(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, PipewrightError::PipelineNotFound { .. }));
    }

    #[test]
    fn test_round_trip_yaml() {
        let pipeline = PipelineDefinition::new("test")
            .with_env("KEY", "value")
            .with_parallel_step(StepSpec::new("lint", ["true"]))
            .with_step(StepSpec::new("build", ["make", "make check"]).with_description("compile"))
            .with_cleanup_step(StepSpec::new("tidy", ["rm -f out"]));

        let yaml = pipeline.to_yaml().unwrap();
        let parsed = PipelineDefinition::from_yaml(&yaml).unwrap();

        assert_eq!(parsed, pipeline);
    }
}
