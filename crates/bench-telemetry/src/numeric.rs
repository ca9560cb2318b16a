//! Numeric token extraction.
//!
//! Node output lines carry free-form labels around a single value, e.g.
//! `Batch signed at: 1712345678901`. Values are located with one pattern
//! (optional sign, optional decimal point) and converted with explicit
//! failure when nothing matches or the conversion does not fit the field.

use bench_common::{BenchError, BenchResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC_TOKEN: Regex =
        Regex::new(r"[-+]?\d*\.?\d+").expect("numeric token pattern is valid");
}

/// First numeric token in `line`.
pub fn first_number(line: &str) -> Option<&str> {
    NUMERIC_TOKEN.find(line).map(|m| m.as_str())
}

/// Last numeric token in `line`.
pub fn last_number(line: &str) -> Option<&str> {
    NUMERIC_TOKEN.find_iter(line).last().map(|m| m.as_str())
}

pub fn parse_f64(token: &str, field: &str) -> BenchResult<f64> {
    token
        .parse::<f64>()
        .map_err(|_| BenchError::malformed(format!("{}: {:?} is not a number", field, token)))
}

pub fn parse_i64(token: &str, field: &str) -> BenchResult<i64> {
    token
        .trim_start_matches('+')
        .parse::<i64>()
        .map_err(|_| BenchError::malformed(format!("{}: {:?} is not an integer", field, token)))
}

pub fn parse_u64(token: &str, field: &str) -> BenchResult<u64> {
    token.trim_start_matches('+').parse::<u64>().map_err(|_| {
        BenchError::malformed(format!(
            "{}: {:?} is not a non-negative integer",
            field, token
        ))
    })
}

fn require<'a>(token: Option<&'a str>, line: &str, field: &str) -> BenchResult<&'a str> {
    token.ok_or_else(|| BenchError::malformed(format!("{}: no number in {:?}", field, line)))
}

/// First numeric token of `line` as an integer.
pub fn first_i64(line: &str, field: &str) -> BenchResult<i64> {
    parse_i64(require(first_number(line), line, field)?, field)
}

/// First numeric token of `line` as a non-negative integer.
pub fn first_u64(line: &str, field: &str) -> BenchResult<u64> {
    parse_u64(require(first_number(line), line, field)?, field)
}

/// Last numeric token of `line` as a float.
pub fn last_f64(line: &str, field: &str) -> BenchResult<f64> {
    parse_f64(require(last_number(line), line, field)?, field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number_ignores_labels() {
        assert_eq!(first_number("Batch detected at: 1712345678901"), Some("1712345678901"));
        assert_eq!(first_number("delay -42 ms"), Some("-42"));
        assert_eq!(first_number("took .5s"), Some(".5"));
        assert_eq!(first_number("no digits here"), None);
    }

    #[test]
    fn test_last_number_takes_trailing_token() {
        assert_eq!(last_number("Event 3 of batch detected after 0.52"), Some("0.52"));
        assert_eq!(last_number("Detected event at 12"), Some("12"));
        assert_eq!(last_number(""), None);
    }

    #[test]
    fn test_integer_conversion_rejects_decimals() {
        let err = first_i64("Batch size: 3.5", "batch size").unwrap_err();
        assert!(matches!(err, BenchError::MalformedBatch { .. }));
        assert_eq!(first_i64("+17", "x").unwrap(), 17);
    }

    #[test]
    fn test_unsigned_conversion_rejects_negative() {
        assert!(first_u64("Batch size: -3", "batch size").is_err());
        assert_eq!(first_u64("Batch size: 3", "batch size").unwrap(), 3);
    }

    #[test]
    fn test_missing_number_names_field() {
        let err = last_f64("Detected event", "event detect delay").unwrap_err();
        assert!(err.to_string().contains("event detect delay"));
    }
}
