// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Utility modules
//!
//! Formatting helpers shared by the engine and the CLI.

pub mod colors;
pub mod format;
pub mod spinner;

pub use colors::*;
pub use format::{format_secs, parse_secs};
pub use spinner::*;
