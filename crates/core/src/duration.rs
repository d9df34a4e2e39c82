// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration string parsing for configuration values.

use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration string like "30s", "5m", "1h" into a Duration.
///
/// A bare number is seconds. Millisecond suffixes are accepted for test
/// configurations with sub-second cadences.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::invalid("duration", "empty duration string"));
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| ConfigError::invalid("duration", format!("invalid number in duration: {}", s)))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => {
            return Err(ConfigError::invalid(
                "duration",
                format!("unknown duration suffix: {}", other),
            ));
        }
    };

    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
