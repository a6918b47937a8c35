// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! History command - summarize recent runs

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::report::RunHistory;
use crate::utils::{dimmed, print_header, print_section};

/// Run the history command
pub async fn run(reports_dir: PathBuf, json: bool, verbose: bool) -> Result<()> {
    let history = RunHistory::load(&reports_dir)?;
    let stats = history.stats();

    if json {
        let out = serde_json::to_string_pretty(&stats)
            .map_err(|e| miette::miette!("Failed to serialize history: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    print_header("Pipeline history");

    if history.is_empty() {
        println!("No runs recorded in {}", reports_dir.display());
        return Ok(());
    }

    println!("  Runs:         {}", stats.total_runs);
    println!("  Success rate: {:.1}%", stats.success_rate);
    println!("  Avg duration: {:.1}s", stats.avg_duration);

    if let Some(last) = &stats.last_run {
        let status = if last.success {
            "success".green()
        } else {
            "failed".red()
        };
        println!(
            "  Last run:     {} {}",
            status,
            dimmed(&last.start_time.format("%Y-%m-%d %H:%M:%S").to_string())
        );
    }

    if verbose {
        print_section("Recent runs");
        for run in history.runs().iter().rev() {
            let symbol = if run.success { "✓".green() } else { "✗".red() };
            let file = run
                .pipeline_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {} {} {:>8.2}s  {} steps  {}",
                symbol,
                run.start_time.format("%Y-%m-%d %H:%M:%S"),
                run.duration.as_secs_f64(),
                run.steps.len(),
                dimmed(&file)
            );
        }
    }

    Ok(())
}
