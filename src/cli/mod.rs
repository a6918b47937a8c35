// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipewright.

pub mod console;
pub mod history;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Three-phase shell pipeline runner
///
/// Runs concurrent steps, sequential steps and cleanup steps from a YAML
/// definition and saves a JSON report of every run.
#[derive(Parser, Debug)]
#[clap(
    name = "pipewright",
    version,
    about = "Run shell pipelines: concurrent steps, sequential steps, cleanup",
    long_about = None,
    after_help = "Examples:\n\
        pipewright run                          Run ./pipeline.yml\n\
        pipewright run -p ci.yml --parallel     Run parallel_steps concurrently\n\
        pipewright run -e APP_ENV=ci --continue Keep going after failures\n\
        pipewright validate ci.yml              Check a definition\n\
        pipewright history                      Summarize recent runs\n\n\
        See 'pipewright <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = "pipeline.yml")]
        pipeline: PathBuf,

        /// Extra environment variable for every step (KEY=VALUE, repeatable)
        #[clap(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Run parallel_steps concurrently
        #[clap(long)]
        parallel: bool,

        /// Continue after a failed step
        #[clap(long = "continue")]
        continue_on_error: bool,

        /// Log level (error, warn, info, debug, trace)
        #[clap(long, env = "PIPEWRIGHT_LOG", value_name = "LEVEL")]
        log_level: Option<String>,
    },

    /// Validate a pipeline definition
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = "pipeline.yml")]
        pipeline: PathBuf,
    },

    /// Summarize recent runs from saved reports
    History {
        /// Reports directory
        #[clap(default_value = "reports")]
        reports_dir: PathBuf,

        /// Print the summary as JSON
        #[clap(long)]
        json: bool,
    },
}

impl Commands {
    /// Log level requested on the command line, if any
    pub fn log_level(&self) -> Option<&str> {
        match self {
            Self::Run { log_level, .. } => log_level.as_deref(),
            _ => None,
        }
    }
}
