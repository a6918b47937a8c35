// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Command classification
//!
//! Decides whether a command string can be spawned directly from its argv or
//! has to go through `sh -c`. When in doubt the answer is the shell: it
//! understands every string we would otherwise split by hand.

use std::fmt;

/// Characters that make a command line depend on shell interpretation.
///
/// Quoted occurrences are not exempted; a quoted `|` just routes the command
/// through the shell, which still runs it correctly.
const SHELL_METACHARACTERS: &[char] = &[
    '|', '&', ';', '<', '>', '`', '$', '*', '?', '[', ']', '~', '(', ')', '{', '}', '#', '\n',
];

/// Shell builtins that have no executable of their own
const SHELL_BUILTINS: &[&str] = &[
    ".", "alias", "cd", "declare", "eval", "exec", "exit", "export", "let", "local", "popd",
    "pushd", "read", "readonly", "set", "shift", "shopt", "source", "trap", "ulimit", "umask",
    "unalias", "unset", "wait",
];

/// A classified command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Plain program + arguments, spawned without a shell
    Simple(Vec<String>),
    /// Anything needing shell semantics, run as `sh -c <raw>`
    Shell(String),
}

impl CommandLine {
    /// Classify a raw command string
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.contains(SHELL_METACHARACTERS) {
            return Self::Shell(trimmed.to_string());
        }

        let Some(argv) = split_words(trimmed) else {
            // Unbalanced quotes: let the shell produce the error message
            return Self::Shell(trimmed.to_string());
        };

        match argv.first() {
            Some(first) if SHELL_BUILTINS.contains(&first.as_str()) || is_assignment(first) => {
                Self::Shell(trimmed.to_string())
            }
            _ => Self::Simple(argv),
        }
    }

    /// Program that would be executed directly, if any
    pub fn program(&self) -> Option<&str> {
        match self {
            Self::Simple(argv) => argv.first().map(String::as_str),
            Self::Shell(_) => None,
        }
    }

    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Simple(argv) => argv.is_empty(),
            Self::Shell(raw) => raw.trim().is_empty(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(argv) => write!(f, "{}", argv.join(" ")),
            Self::Shell(raw) => write!(f, "{}", raw),
        }
    }
}

/// `NAME=value` prefix, as in `RUST_LOG=debug cargo test`
fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Split a command line into words, honoring quotes and backslashes.
///
/// Returns `None` when a quote is left open or the line ends in a lone
/// backslash.
fn split_words(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        other => current.push(other),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            escaped @ ('"' | '\\') => current.push(escaped),
                            other => {
                                current.push('\\');
                                current.push(other);
                            }
                        },
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Some(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(words: &[&str]) -> CommandLine {
        CommandLine::Simple(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn test_plain_command_is_simple() {
        assert_eq!(
            CommandLine::parse("cargo build --release"),
            simple(&["cargo", "build", "--release"])
        );
    }

    #[test]
    fn test_quotes_are_split_like_a_shell() {
        assert_eq!(
            CommandLine::parse(r#"git commit -m "fix: the thing" --author='A B'"#),
            simple(&["git", "commit", "-m", "fix: the thing", "--author=A B"])
        );
        assert_eq!(CommandLine::parse(r#"echo "a \"b\"""#), simple(&["echo", r#"a "b""#]));
        assert_eq!(CommandLine::parse(r"touch my\ file"), simple(&["touch", "my file"]));
    }

    #[test]
    fn test_metacharacters_need_shell() {
        for raw in [
            "cat log | grep error",
            "make > build.log",
            "true && false",
            "a; b",
            "echo $HOME",
            "echo `date`",
            "ls *.rs",
            "cd ~",
            "sleep 10 &",
        ] {
            assert!(
                matches!(CommandLine::parse(raw), CommandLine::Shell(_)),
                "expected shell for {raw:?}"
            );
        }
    }

    #[test]
    fn test_builtins_and_assignments_need_shell() {
        assert_eq!(CommandLine::parse("cd build"), CommandLine::Shell("cd build".into()));
        assert_eq!(
            CommandLine::parse("export A=1"),
            CommandLine::Shell("export A=1".into())
        );
        assert_eq!(
            CommandLine::parse("RUST_LOG=debug cargo test"),
            CommandLine::Shell("RUST_LOG=debug cargo test".into())
        );
        // An `=` inside an argument is not an assignment
        assert_eq!(
            CommandLine::parse("cargo --config=x.toml"),
            simple(&["cargo", "--config=x.toml"])
        );
    }

    #[test]
    fn test_unbalanced_quote_falls_back_to_shell() {
        assert_eq!(
            CommandLine::parse("echo 'unterminated"),
            CommandLine::Shell("echo 'unterminated".into())
        );
    }

    #[test]
    fn test_empty_and_program() {
        assert!(CommandLine::parse("   ").is_empty());
        assert_eq!(CommandLine::parse("pytest -q").program(), Some("pytest"));
        assert_eq!(CommandLine::parse("a | b").program(), None);
    }
}
