//! Parsing and formatting of the engine's textual measurements.
//!
//! The engine reports times and sizes as `"<number> <unit>"`. Internally
//! everything is normalized to milliseconds (time) and megabytes (memory,
//! decimal 1000-based). An unknown unit is a contract violation with the
//! engine's output format and is surfaced as a typed error that callers treat
//! as fatal.

use crate::sentinel;

#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("malformed measurement: {0:?}")]
    Malformed(String),
    #[error("found invalid time scale: {0:?}")]
    UnknownTimeUnit(String),
    #[error("found invalid memory scale: {0:?}")]
    UnknownMemoryUnit(String),
}

fn split_measurement(input: &str) -> Result<(f64, &str), UnitError> {
    let trimmed = input.trim();
    let mut parts = trimmed.split_whitespace();
    let number = parts
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .ok_or_else(|| UnitError::Malformed(input.to_string()))?;
    let unit = parts
        .next()
        .ok_or_else(|| UnitError::Malformed(input.to_string()))?;
    Ok((number, unit))
}

/// Parse `"<n> <unit>"` into milliseconds.
pub fn parse_time(input: &str) -> Result<f64, UnitError> {
    let (number, unit) = split_measurement(input)?;

    let factor = match unit {
        "ns" => 1.0 / 1000.0 / 1000.0,
        "µs" => 1.0 / 1000.0,
        "ms" => 1.0,
        "s" => 1000.0,
        "mins" => 60.0 * 1000.0,
        "hours" => 60.0 * 60.0 * 1000.0,
        "days" => 24.0 * 60.0 * 60.0 * 1000.0,
        "weeks" => 7.0 * 24.0 * 60.0 * 60.0 * 1000.0,
        other => return Err(UnitError::UnknownTimeUnit(other.to_string())),
    };

    Ok(number * factor)
}

/// Parse `"<n> <unit>"` into megabytes (decimal, 1000-based).
pub fn parse_memory(input: &str) -> Result<f64, UnitError> {
    let (number, unit) = split_measurement(input)?;

    let factor = match unit {
        "B" => 1.0 / 1000.0 / 1000.0,
        "KB" => 1.0 / 1000.0,
        "MB" => 1.0,
        "GB" => 1000.0,
        "TB" => 1000.0 * 1000.0,
        "PB" => 1000.0 * 1000.0 * 1000.0,
        "EB" => 1000.0 * 1000.0 * 1000.0 * 1000.0,
        other => return Err(UnitError::UnknownMemoryUnit(other.to_string())),
    };

    Ok(number * factor)
}

const TIME_SUFFIXES: [&str; 7] = ["ns", "µs", "ms", "s", "mins", "hours", "days"];
const TIME_BOUNDS_NS: [f64; 8] = [
    1.0,
    1_000.0,
    1_000_000.0,
    1_000_000_000.0,
    60.0 * 1_000_000_000.0,
    3_600.0 * 1_000_000_000.0,
    86_400.0 * 1_000_000_000.0,
    604_800.0 * 1_000_000_000.0,
];

const MEMORY_SUFFIXES: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const MEMORY_BOUNDS_B: [f64; 7] = [
    1.0,
    1_000.0,
    1_000_000.0,
    1_000_000_000.0,
    1_000_000_000_000.0,
    1_000_000_000_000_000.0,
    1_000_000_000_000_000_000.0,
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a time in milliseconds with the largest unit whose magnitude fits.
/// Sentinel codes and NaN render as their textual description.
pub fn format_time(time_ms: f64) -> String {
    if let Some(text) = sentinel::describe(time_ms) {
        return text.to_string();
    }

    let time_ns = time_ms * 1000.0 * 1000.0;

    for (i, suffix) in TIME_SUFFIXES.iter().enumerate() {
        if time_ns > TIME_BOUNDS_NS[i + 1] {
            continue;
        }
        return format!("{} {}", round2(time_ns / TIME_BOUNDS_NS[i]), suffix);
    }

    format!("{} weeks", round2(time_ns / TIME_BOUNDS_NS[7]))
}

/// Render a size in megabytes with the largest unit whose magnitude fits.
pub fn format_memory(memory_mb: f64) -> String {
    if let Some(text) = sentinel::describe(memory_mb) {
        return text.to_string();
    }

    let memory_b = memory_mb * 1000.0 * 1000.0;

    for (i, suffix) in MEMORY_SUFFIXES.iter().enumerate() {
        if memory_b > MEMORY_BOUNDS_B[i + 1] {
            continue;
        }
        return format!("{} {}", round2(memory_b / MEMORY_BOUNDS_B[i]), suffix);
    }

    format!("{} EB", round2(memory_b / MEMORY_BOUNDS_B[6]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_units_normalize_to_ms() {
        assert_eq!(parse_time("1000000 ns").unwrap(), 1.0);
        assert_eq!(parse_time("1500 µs").unwrap(), 1.5);
        assert_eq!(parse_time("12.5 ms").unwrap(), 12.5);
        assert_eq!(parse_time("2 s").unwrap(), 2000.0);
        assert_eq!(parse_time("3 mins").unwrap(), 180_000.0);
        assert_eq!(parse_time("1 hours").unwrap(), 3_600_000.0);
        assert_eq!(parse_time("1 days").unwrap(), 86_400_000.0);
        assert_eq!(parse_time("1 weeks").unwrap(), 604_800_000.0);
    }

    #[test]
    fn memory_units_normalize_to_mb() {
        assert_eq!(parse_memory("1000000 B").unwrap(), 1.0);
        assert_eq!(parse_memory("512 KB").unwrap(), 0.512);
        assert_eq!(parse_memory("7 MB").unwrap(), 7.0);
        assert_eq!(parse_memory("2 GB").unwrap(), 2000.0);
        assert_eq!(parse_memory("1 TB").unwrap(), 1_000_000.0);
    }

    #[test]
    fn unknown_units_are_rejected() {
        assert!(matches!(
            parse_time("3 fortnights"),
            Err(UnitError::UnknownTimeUnit(_))
        ));
        assert!(matches!(
            parse_memory("3 GiB"),
            Err(UnitError::UnknownMemoryUnit(_))
        ));
        assert!(matches!(parse_time("abc"), Err(UnitError::Malformed(_))));
    }

    #[test]
    fn formatting_picks_the_largest_fitting_unit() {
        assert_eq!(format_time(1.5), "1.5 ms");
        assert_eq!(format_time(0.0005), "500 ns");
        assert_eq!(format_time(90_000.0), "1.5 mins");
        assert_eq!(format_memory(0.5), "500 KB");
        assert_eq!(format_memory(2500.0), "2.5 GB");
    }

    #[test]
    fn formatting_describes_sentinels() {
        assert_eq!(format_time(-1.0), "did not run");
        assert_eq!(format_time(-2.0), "mem");
        assert_eq!(format_time(-3.0), "time");
        assert_eq!(format_memory(-4.0), "unknown error");
        assert_eq!(format_memory(-5.0), "did not run");
        assert_eq!(format_memory(f64::NAN), "did not run");
    }
}
