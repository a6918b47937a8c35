// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run command - execute a pipeline

use colored::Colorize;
use miette::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::console::ConsoleSink;
use crate::errors::{PipewrightError, PipewrightResult, RecoverySuggestion};
use crate::pipeline::{
    PipelineDefinition, PipelineRunner, PipelineValidator, RunOptions, StopHandle,
};
use crate::report::PipelineRunReport;

/// Run a pipeline file
pub async fn run(
    pipeline_path: PathBuf,
    env: Vec<String>,
    parallel: bool,
    continue_on_error: bool,
    verbose: bool,
    log_events: bool,
) -> Result<()> {
    let env_overrides = parse_env_vars(&env)?;

    // Loaded up front to fail with a diagnostic and to size the progress bar
    let definition = PipelineDefinition::from_file(&pipeline_path)?;

    let validation = PipelineValidator::validate(&definition);
    if !validation.is_valid() {
        return Err(PipewrightError::InvalidPipeline {
            reason: validation.errors.join("; "),
            help: Some(format!(
                "Run 'pipewright validate {}' for details",
                pipeline_path.display()
            )),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    // Parallel steps only run (and count) with --parallel
    let total = if parallel {
        definition.total_steps()
    } else {
        definition.total_steps() - definition.parallel_steps.len()
    };

    let options = RunOptions {
        parallel,
        continue_on_error,
        env_overrides,
    };

    let sink = Arc::new(ConsoleSink::new(total as u64, verbose).with_event_log(log_events));
    let runner = PipelineRunner::new(sink);

    let stop = runner.stop_handle();
    let ctrl_c = tokio::spawn(interrupt_loop(stop.clone()));

    let outcome = runner.run_file(&pipeline_path, &options).await;
    ctrl_c.abort();

    if let Some(report) = &outcome.report {
        print_recovery(report);
    }

    if stop.is_stop_requested() {
        Err(miette::miette!("Pipeline stopped"))
    } else if outcome.success {
        Ok(())
    } else {
        Err(miette::miette!("Pipeline failed"))
    }
}

/// First Ctrl-C stops the run gracefully, a second one kills what is left
async fn interrupt_loop(stop: StopHandle) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if stop.request_stop() {
            tracing::info!("Received Ctrl-C, stopping");
            continue;
        }

        let killed = stop.force_stop();
        eprintln!(
            "{}",
            format!("Interrupted again, killed {} running process(es)", killed).red()
        );
        std::process::exit(130);
    }
}

/// Parse `KEY=VALUE` entries
pub fn parse_env_vars(entries: &[String]) -> PipewrightResult<HashMap<String, String>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(PipewrightError::InvalidEnvVar {
                entry: entry.clone(),
            }),
        })
        .collect()
}

fn print_recovery(report: &PipelineRunReport) {
    for step in report.steps.iter().filter(|s| s.is_error()) {
        let Some(code) = step.exit_code else {
            continue;
        };
        let stderr = step.error.as_deref().unwrap_or("");

        if let Some(suggestion) = RecoverySuggestion::for_exit_code(code, stderr) {
            eprintln!();
            eprintln!("{}", format!("Step '{}' failed:", step.name).red().bold());
            eprint!("{}", suggestion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_vars() {
        let vars = parse_env_vars(&["A=1".into(), "URL=http://x/?q=1".into(), "EMPTY=".into()]).unwrap();
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["URL"], "http://x/?q=1");
        assert_eq!(vars["EMPTY"], "");
    }

    #[test]
    fn test_parse_env_vars_rejects_malformed() {
        for bad in ["NOVALUE", "=value"] {
            let err = parse_env_vars(&[bad.to_string()]).unwrap_err();
            assert!(matches!(err, PipewrightError::InvalidEnvVar { .. }));
        }
    }
}
