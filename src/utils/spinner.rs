// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Progress bar utilities

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Create a progress bar counting finished steps
///
/// The bar is hidden when stderr is not a terminal so piped output stays
/// clean.
pub fn create_step_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_bar()
        .template("{spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} steps {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb
}

/// Create a bar that draws nothing (for non-interactive output)
pub fn create_hidden_bar(total: u64) -> ProgressBar {
    ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts() {
        let pb = create_hidden_bar(3);
        pb.inc(1);
        pb.inc(1);
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
    }
}
