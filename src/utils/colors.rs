// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Terminal styling shared by the CLI commands

use colored::{ColoredString, Colorize};
use std::io::IsTerminal;

use crate::executors::StepStatus;

pub fn success(msg: &str) -> ColoredString {
    msg.green()
}

pub fn error(msg: &str) -> ColoredString {
    msg.red()
}

pub fn warning(msg: &str) -> ColoredString {
    msg.yellow()
}

pub fn dimmed(msg: &str) -> ColoredString {
    msg.dimmed()
}

/// Symbol shown next to a finished step
pub fn status_symbol(status: StepStatus) -> ColoredString {
    match status {
        StepStatus::Success => "✓".green(),
        StepStatus::Error => "✗".red(),
        StepStatus::Cancelled => "⊘".yellow(),
    }
}

/// Whether stdout should get ANSI colors
///
/// Off when `NO_COLOR` is set, when stdout is not a terminal, or for
/// `TERM=dumb`.
pub fn should_use_colors() -> bool {
    colors_enabled(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var("TERM").ok().as_deref(),
        std::io::stdout().is_terminal(),
    )
}

fn colors_enabled(no_color: bool, term: Option<&str>, is_terminal: bool) -> bool {
    !no_color && is_terminal && term != Some("dumb")
}

/// Bold title over a rule at least 40 columns wide
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.chars().count().max(40)));
}

pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

pub fn print_success(msg: &str) {
    println!("  {} {}", status_symbol(StepStatus::Success), msg);
}

pub fn print_error(msg: &str) {
    println!("  {} {}", status_symbol(StepStatus::Error), msg);
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}
