//! Truthness of `java.lang.String` predicates.
//!
//! When a predicate holds, the false side gets the `not_null` constant:
//! there is no meaningful gradient towards making an equal string unequal.

use heurist_bytecode::Value;
use regex::Regex;

use crate::distance::{heuristic_from_scaled_distance_with_base, left_alignment_distance_chars};
use crate::error::DistanceError;
use crate::heuristic::HeuristicConfig;
use crate::regex_distance::regex_distance;
use crate::truthness::Truthness;

fn held(cfg: &HeuristicConfig) -> Result<Truthness, DistanceError> {
    Truthness::taken_true(cfg.not_null)
}

fn missed_by(cfg: &HeuristicConfig, distance: f64) -> Result<Truthness, DistanceError> {
    let h = heuristic_from_scaled_distance_with_base(cfg.not_null, distance)?;
    Truthness::taken_false(h.min(next_below_one()))
}

fn null_argument(cfg: &HeuristicConfig) -> Result<Truthness, DistanceError> {
    Truthness::taken_false(cfg.reached_but_null)
}

// a mismatch must never score as a hit, even for a sub-unit distance
fn next_below_one() -> f64 {
    1.0 - f64::EPSILON
}

/// `receiver.equals(other)`.
pub fn equals(cfg: &HeuristicConfig, receiver: &str, other: &Value) -> Result<Truthness, DistanceError> {
    match other {
        Value::String(s) if s == receiver => held(cfg),
        Value::String(s) => {
            let a: Vec<char> = receiver.chars().collect();
            let b: Vec<char> = s.chars().collect();
            missed_by(cfg, left_alignment_distance_chars(&a, &b))
        }
        _ => null_argument(cfg),
    }
}

/// `receiver.equalsIgnoreCase(other)`.
pub fn equals_ignore_case(
    cfg: &HeuristicConfig,
    receiver: &str,
    other: Option<&str>,
) -> Result<Truthness, DistanceError> {
    match other {
        None => null_argument(cfg),
        Some(s) => {
            let a: Vec<char> = receiver.to_lowercase().chars().collect();
            let b: Vec<char> = s.to_lowercase().chars().collect();
            if a == b {
                held(cfg)
            } else {
                missed_by(cfg, left_alignment_distance_chars(&a, &b))
            }
        }
    }
}

/// `receiver.startsWith(prefix, offset)`.
pub fn starts_with(
    cfg: &HeuristicConfig,
    receiver: &str,
    prefix: Option<&str>,
    offset: i64,
) -> Result<Truthness, DistanceError> {
    let Some(prefix) = prefix else {
        return null_argument(cfg);
    };
    let text: Vec<char> = receiver.chars().collect();
    let prefix: Vec<char> = prefix.chars().collect();

    if offset < 0 || offset as usize > text.len() {
        // an out of range offset can only be fixed by moving it
        let shift = if offset < 0 {
            offset.unsigned_abs() as f64
        } else {
            (offset as usize - text.len()) as f64
        };
        let base = left_alignment_distance_chars(&[], &prefix);
        return missed_by(cfg, base + shift);
    }

    let start = offset as usize;
    let end = (start + prefix.len()).min(text.len());
    let window = &text[start..end];
    if window == prefix.as_slice() {
        return held(cfg);
    }
    missed_by(cfg, left_alignment_distance_chars(window, &prefix))
}

/// `receiver.endsWith(suffix)`.
pub fn ends_with(
    cfg: &HeuristicConfig,
    receiver: &str,
    suffix: Option<&str>,
) -> Result<Truthness, DistanceError> {
    let Some(suffix) = suffix else {
        return null_argument(cfg);
    };
    let text_len = receiver.chars().count() as i64;
    let suffix_len = suffix.chars().count() as i64;
    let offset = (text_len - suffix_len).max(0);
    if text_len < suffix_len {
        let a: Vec<char> = receiver.chars().collect();
        let b: Vec<char> = suffix.chars().collect();
        return missed_by(cfg, left_alignment_distance_chars(&a, &b));
    }
    starts_with(cfg, receiver, Some(suffix), offset)
}

/// `receiver.isEmpty()`.
pub fn is_empty(cfg: &HeuristicConfig, receiver: &str) -> Result<Truthness, DistanceError> {
    truthness_to_empty(cfg, receiver.chars().count())
}

/// Truthness of a container of `len` elements being empty.
pub fn truthness_to_empty(cfg: &HeuristicConfig, len: usize) -> Result<Truthness, DistanceError> {
    if len == 0 {
        Truthness::taken_true(cfg.not_empty)
    } else {
        let h = heuristic_from_scaled_distance_with_base(cfg.reached_but_empty, len as f64)?;
        Truthness::taken_false(h)
    }
}

/// `receiver.contains(needle)`: the best alignment of the needle against
/// every window of the receiver.
pub fn contains(
    cfg: &HeuristicConfig,
    receiver: &str,
    needle: Option<&str>,
) -> Result<Truthness, DistanceError> {
    let Some(needle) = needle else {
        return null_argument(cfg);
    };
    if receiver.contains(needle) {
        return held(cfg);
    }
    let text: Vec<char> = receiver.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    if text.len() <= needle.len() {
        return missed_by(cfg, left_alignment_distance_chars(&text, &needle));
    }
    let best = text
        .windows(needle.len())
        .map(|w| left_alignment_distance_chars(w, &needle))
        .fold(f64::MAX, f64::min);
    missed_by(cfg, best)
}

/// Anchored match of the whole input, as `String.matches` answers it.
pub fn full_match(receiver: &str, regex: &str) -> Result<bool, DistanceError> {
    let re = Regex::new(&format!("^(?:{regex})$")).map_err(|e| DistanceError::InvalidRegex(e.to_string()))?;
    Ok(re.is_match(receiver))
}

/// `receiver.matches(regex)`.
///
/// The taken side comes from the regex engine; the edit distance to the
/// pattern's language only grades a miss.
pub fn matches(
    cfg: &HeuristicConfig,
    receiver: &str,
    regex: &str,
) -> Result<Truthness, DistanceError> {
    if full_match(receiver, regex)? {
        return held(cfg);
    }
    match regex_distance(receiver, regex) {
        Ok(distance) => missed_by(cfg, distance),
        Err(DistanceError::RegexTooComplex(_)) => Truthness::taken_false(cfg.not_null),
        Err(e) => Err(e),
    }
}

/// `receiver.matches(regex)` without the distance search: a miss scores the
/// `not_null` floor.
pub fn matches_without_distance(
    cfg: &HeuristicConfig,
    receiver: &str,
    regex: &str,
) -> Result<Truthness, DistanceError> {
    if full_match(receiver, regex)? {
        held(cfg)
    } else {
        Truthness::taken_false(cfg.not_null)
    }
}
