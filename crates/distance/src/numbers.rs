//! Truthness of numeric parsing succeeding (`Integer.parseInt` and friends).
//! The true side means "no NumberFormatException".

use crate::distance::{distance_to_digit, heuristic_from_scaled_distance_with_base, MAX_CHAR_DISTANCE};
use crate::error::DistanceError;
use crate::heuristic::HeuristicConfig;
use crate::truthness::Truthness;

/// Digits in `i32::MAX` and `i64::MAX`.
pub const INT_MAX_DIGITS: usize = 10;
pub const LONG_MAX_DIGITS: usize = 19;

pub fn parse_int(cfg: &HeuristicConfig, input: Option<&str>) -> Result<Truthness, DistanceError> {
    parse_integral(cfg, input, INT_MAX_DIGITS, |s| s.parse::<i32>().is_ok())
}

pub fn parse_long(cfg: &HeuristicConfig, input: Option<&str>) -> Result<Truthness, DistanceError> {
    parse_integral(cfg, input, LONG_MAX_DIGITS, |s| s.parse::<i64>().is_ok())
}

fn parse_integral(
    cfg: &HeuristicConfig,
    input: Option<&str>,
    max_digits: usize,
    parses: impl Fn(&str) -> bool,
) -> Result<Truthness, DistanceError> {
    let Some(input) = input else {
        return Truthness::taken_false(cfg.reached_but_null);
    };
    if input.is_empty() {
        return Truthness::taken_false(cfg.reached_but_empty);
    }
    if parses(input) {
        return Truthness::taken_true(cfg.not_null);
    }

    let digits = input
        .strip_prefix('-')
        .or_else(|| input.strip_prefix('+'))
        .unwrap_or(input);
    let mut distance = if digits.is_empty() { 1.0 } else { 0.0 };
    for c in digits.chars() {
        distance += distance_to_digit(c);
    }
    let len = digits.chars().count();
    if len > max_digits {
        distance += (len - max_digits) as f64 * MAX_CHAR_DISTANCE;
    }
    // all digits but out of range
    if distance == 0.0 {
        distance = 1.0;
    }
    let h = heuristic_from_scaled_distance_with_base(cfg.not_empty, distance)?;
    Truthness::taken_false(h)
}

/// `Double.parseDouble`. Only the plain decimal syntax gets a gradient;
/// exponents are accepted but not guided towards.
pub fn parse_double(cfg: &HeuristicConfig, input: Option<&str>) -> Result<Truthness, DistanceError> {
    let Some(input) = input else {
        return Truthness::taken_false(cfg.reached_but_null);
    };
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Truthness::taken_false(cfg.reached_but_empty);
    }
    if java_double_syntax(trimmed) {
        return Truthness::taken_true(cfg.not_null);
    }

    let body = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    let mut seen_dot = false;
    let mut distance = 0.0;
    for c in body.chars() {
        if c == '.' && !seen_dot {
            seen_dot = true;
            continue;
        }
        distance += distance_to_digit(c);
    }
    if distance == 0.0 {
        distance = 1.0;
    }
    let h = heuristic_from_scaled_distance_with_base(cfg.not_empty, distance)?;
    Truthness::taken_false(h)
}

/// What `Double.parseDouble` accepts, minus hex floats and type suffixes.
pub fn java_double_syntax(s: &str) -> bool {
    let s = s.trim();
    let body = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
    if body == "NaN" || body == "Infinity" {
        return true;
    }
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.is_none_or(all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.is_none_or(str::is_empty) {
        return false;
    }
    match exponent {
        None => true,
        Some(e) => {
            let e = e.strip_prefix('-').or_else(|| e.strip_prefix('+')).unwrap_or(e);
            !e.is_empty() && all_digits(e)
        }
    }
}
