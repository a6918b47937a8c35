// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline validation
//!
//! Validates a definition before execution. Errors make the definition
//! unusable; warnings are reported but the run goes ahead.

use std::collections::HashSet;

use crate::executors::CommandLine;
use crate::pipeline::{PipelineDefinition, StepSpec};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(pipeline: &PipelineDefinition) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.parallel_steps.is_empty() && pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined (expected 'parallel_steps' or 'pipeline')");
        }

        Self::validate_phase("parallel_steps", &pipeline.parallel_steps, &mut result);
        Self::validate_phase("pipeline", &pipeline.steps, &mut result);
        Self::validate_phase("cleanup", &pipeline.cleanup_steps, &mut result);

        result
    }

    /// Validate the steps of one phase
    fn validate_phase(phase: &str, steps: &[StepSpec], result: &mut ValidationResult) {
        let mut seen_names = HashSet::new();

        for step in steps {
            if step.name.trim().is_empty() {
                result.add_error(&format!("A step in '{}' has an empty name", phase));
            }

            if !seen_names.insert(step.name.as_str()) {
                result.add_warning(&format!(
                    "Duplicate step name '{}' in '{}': events and results will be ambiguous",
                    step.name, phase
                ));
            }

            if step.commands.is_empty() {
                result.add_warning(&format!(
                    "Step '{}' has no commands and will fail when run",
                    step.name
                ));
            }

            for (i, command) in step.commands.iter().enumerate() {
                if command.trim().is_empty() {
                    result.add_warning(&format!(
                        "Step '{}': command {} is empty",
                        step.name,
                        i + 1
                    ));
                }
            }
        }
    }

    /// Check that directly executed programs can be found (runtime validation)
    ///
    /// Commands that go through the shell are skipped: whatever they run is
    /// only known to the shell.
    pub fn validate_executables(pipeline: &PipelineDefinition) -> Vec<String> {
        let mut missing = Vec::new();
        let mut checked = HashSet::new();

        let all_steps = pipeline
            .parallel_steps
            .iter()
            .chain(&pipeline.steps)
            .chain(&pipeline.cleanup_steps);

        for step in all_steps {
            for command in &step.commands {
                let line = CommandLine::parse(command);
                let Some(program) = line.program() else {
                    continue;
                };

                if !checked.insert(program.to_string()) {
                    continue;
                }

                if which::which(program).is_err() {
                    missing.push(format!(
                        "Step '{}': program '{}' not found on PATH",
                        step.name, program
                    ));
                }
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_pipeline() {
        let pipeline = PipelineDefinition::new("empty");

        let result = PipelineValidator::validate(&pipeline);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no steps"));
    }

    #[test]
    fn test_cleanup_only_is_invalid() {
        let pipeline =
            PipelineDefinition::new("cleanup-only").with_cleanup_step(StepSpec::new("tidy", ["true"]));

        let result = PipelineValidator::validate(&pipeline);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_duplicate_names_warns() {
        let pipeline = PipelineDefinition::new("dup")
            .with_step(StepSpec::new("build", ["true"]))
            .with_step(StepSpec::new("build", ["true"]));

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("Duplicate")));
    }

    #[test]
    fn test_same_name_in_different_phases_is_fine() {
        let pipeline = PipelineDefinition::new("phases")
            .with_parallel_step(StepSpec::new("check", ["true"]))
            .with_step(StepSpec::new("check", ["true"]));

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_step_without_commands_warns() {
        let pipeline = PipelineDefinition::new("t").with_step(StepSpec::new("nothing", Vec::<String>::new()));

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("no commands")));
    }

    #[test]
    fn test_validate_executables() {
        let pipeline = PipelineDefinition::new("t").with_step(StepSpec::new(
            "build",
            [
                "pipewright-definitely-missing-tool --flag",
                "missing-in-shell-is-not-checked | cat",
            ],
        ));

        let missing = PipelineValidator::validate_executables(&pipeline);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("pipewright-definitely-missing-tool"));
    }
}
