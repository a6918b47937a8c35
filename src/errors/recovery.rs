// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Recovery suggestions for failed steps
//!
//! Turns the exit code and stderr of a failed command into something a human
//! can act on.

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest a fix for a command that exited with `exit_code`.
    ///
    /// Returns `None` for exit codes that carry no conventional meaning.
    pub fn for_exit_code(exit_code: i32, stderr: &str) -> Option<Self> {
        match exit_code {
            127 => Some(Self {
                action: "Install the missing command".into(),
                steps: vec![
                    "The shell could not find the program (exit code 127)".into(),
                    "Check the spelling and that it is on PATH for this pipeline".into(),
                ],
            }),
            126 => Some(Self {
                action: "Make the program executable".into(),
                steps: vec![
                    "The program was found but could not be executed (exit code 126)".into(),
                    "Check file permissions, e.g. 'chmod +x <file>'".into(),
                ],
            }),
            code if code > 128 && code <= 128 + 64 => Some(Self {
                action: format!("Command was killed by signal {}", code - 128),
                steps: vec![
                    "The process did not exit on its own".into(),
                    "It may have been stopped, run out of memory, or crashed".into(),
                ],
            }),
            -1 => Some(Self {
                action: "Command was terminated".into(),
                steps: vec!["The process ended without an exit code (killed by a signal)".into()],
            }),
            _ if stderr.contains("Permission denied") => Some(Self {
                action: "Fix file permissions".into(),
                steps: vec!["A file or directory used by the step is not accessible".into()],
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        Ok(())
    }
}
