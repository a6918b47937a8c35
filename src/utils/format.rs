// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Duration and timestamp formatting shared by events and reports

use std::time::Duration;

/// Format a duration as seconds with two decimals, e.g. `"1.25s"`
pub fn format_secs(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

/// Parse the output of [`format_secs`] (the trailing `s` is optional)
pub fn parse_secs(text: &str) -> Option<Duration> {
    let number = text.trim().trim_end_matches('s');
    let secs: f64 = number.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Serde adapter storing a `Duration` as `"12.34s"`
pub mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_secs(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_secs(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid duration '{}'", text)))
    }
}

/// Serde adapter storing a local timestamp as `"2025-01-31 14:05:09"`
pub mod local_timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT).map_err(de::Error::custom)
    }
}
