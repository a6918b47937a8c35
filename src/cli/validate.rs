// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Validate command - check a pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{PipelineDefinition, PipelineValidator, StepSpec};
use crate::utils::{dimmed, print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let definition = match PipelineDefinition::from_file(&pipeline_path) {
        Ok(d) => d,
        Err(e) => {
            print_error("Failed to parse pipeline");
            println!();
            return Err(e.into());
        }
    };

    print_success("Pipeline file is valid YAML");

    let validation = PipelineValidator::validate(&definition);
    let missing_programs = PipelineValidator::validate_executables(&definition);

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !missing_programs.is_empty() {
        print_section(&"Missing programs".yellow().to_string());
        for missing in &missing_programs {
            print_warning(missing);
        }
    }

    if !validation.warnings.is_empty() {
        print_section(&"Warnings".yellow().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        println!("  Name: {}", definition.name);
        if let Some(description) = &definition.description {
            println!("  Description: {}", description);
        }
        print_phase("Parallel steps", &definition.parallel_steps);
        print_phase("Steps", &definition.steps);
        print_phase("Cleanup", &definition.cleanup_steps);
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() || !missing_programs.is_empty() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}

fn print_phase(title: &str, steps: &[StepSpec]) {
    println!("  {}: {}", title, steps.len());
    for step in steps {
        let commands = dimmed(&format!("[{} command(s)]", step.commands.len()));
        println!("    - {} {}", step.name, commands);
    }
}
