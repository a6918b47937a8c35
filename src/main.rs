// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! pipewright - three-phase shell pipeline runner

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipewright::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level / PIPEWRIGHT_LOG win over RUST_LOG
    let filter = match cli.command.log_level() {
        Some(level) => tracing_subscriber::EnvFilter::try_new(format!("pipewright={}", level))
            .map_err(|e| miette::miette!("Invalid log level '{}': {}", level, e))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pipewright=warn".into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if !pipewright::utils::should_use_colors() {
        colored::control::set_override(false);
    }

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let log_events = cli.command.log_level().is_some();

    match cli.command {
        Commands::Run {
            pipeline,
            env,
            parallel,
            continue_on_error,
            ..
        } => {
            pipewright::cli::run::run(
                pipeline,
                env,
                parallel,
                continue_on_error,
                cli.verbose,
                log_events,
            )
            .await
        }
        Commands::Validate { pipeline } => {
            pipewright::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::History { reports_dir, json } => {
            pipewright::cli::history::run(reports_dir, json, cli.verbose).await
        }
    }
}
