//! Raw distance metrics. Everything is computed in `f64`, widening integer
//! operands through `i128` so that differences never wrap.

use heurist_bytecode::Value;

use crate::error::DistanceError;

/// Distance added per character of length difference in string alignment.
pub const MAX_CHAR_DISTANCE: f64 = 65_536.0;

/// `distance + delta`, saturating at `f64::MAX`.
pub fn increased_distance(distance: f64, delta: f64) -> Result<f64, DistanceError> {
    if distance < 0.0 || distance.is_nan() {
        return Err(DistanceError::NegativeDistance(distance));
    }
    if delta < 0.0 || delta.is_nan() {
        return Err(DistanceError::NegativeDistance(delta));
    }
    if f64::MAX - delta <= distance {
        return Ok(f64::MAX);
    }
    Ok(distance + delta)
}

/// Sum of two distances, saturating at `f64::MAX`.
pub fn add_distances(a: f64, b: f64) -> Result<f64, DistanceError> {
    increased_distance(a, b)
}

/// `base + (1 - base) / (distance + 1)`: 1 for distance 0, tends to `base`.
pub fn heuristic_from_scaled_distance_with_base(
    base: f64,
    distance: f64,
) -> Result<f64, DistanceError> {
    if !(0.0..1.0).contains(&base) {
        return Err(DistanceError::InvalidBase(base));
    }
    if distance < 0.0 || distance.is_nan() {
        return Err(DistanceError::NegativeDistance(distance));
    }
    if distance.is_infinite() || distance == f64::MAX {
        return Ok(base);
    }
    Ok(base + (1.0 - base) / (distance + 1.0))
}

/// Rescales a heuristic value `h` in `[0,1]` into `[base,1]`.
pub fn scale_heuristic_with_base(base: f64, h: f64) -> Result<f64, DistanceError> {
    if !(0.0..1.0).contains(&base) {
        return Err(DistanceError::InvalidBase(base));
    }
    if !(0.0..=1.0).contains(&h) {
        return Err(DistanceError::InvalidHeuristic(h));
    }
    Ok(base + (1.0 - base) * h)
}

pub fn distance_to_equality_i64(a: i64, b: i64) -> f64 {
    (a as i128 - b as i128).unsigned_abs() as f64
}

/// `f64::MAX` when either side is not finite.
pub fn distance_to_equality_f64(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return if a == b { 0.0 } else { f64::MAX };
    }
    let d = (a - b).abs();
    if d.is_finite() { d } else { f64::MAX }
}

/// Distance of `value` to the closed range `[min, max]`.
pub fn distance_to_range(value: i64, min: i64, max: i64) -> f64 {
    if value < min {
        distance_to_equality_i64(value, min)
    } else if value > max {
        distance_to_equality_i64(value, max)
    } else {
        0.0
    }
}

pub fn distance_to_digit(c: char) -> f64 {
    distance_to_range(c as i64, '0' as i64, '9' as i64)
}

/// Sum of per-character code point differences plus a large penalty per
/// character of length difference.
pub fn left_alignment_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    left_alignment_distance_chars(&a, &b)
}

pub(crate) fn left_alignment_distance_chars(a: &[char], b: &[char]) -> f64 {
    let diff = a.len().abs_diff(b.len()) as f64;
    let mut dist = diff * MAX_CHAR_DISTANCE;
    for (x, y) in a.iter().zip(b.iter()) {
        dist += (*x as i64 - *y as i64).unsigned_abs() as f64;
    }
    dist
}

/// Generic distance between two runtime values, used by collection
/// heuristics. Values of different kinds are maximally distant.
pub fn value_distance(a: &Value, b: &Value) -> f64 {
    match (a, b) {
        (Value::Null, Value::Null) => 0.0,
        (Value::Int(x), Value::Int(y)) => distance_to_equality_i64(*x, *y),
        (Value::Bool(x), Value::Bool(y)) => if x == y { 0.0 } else { 1.0 },
        (Value::Int(_), Value::Float(_))
        | (Value::Float(_), Value::Int(_))
        | (Value::Float(_), Value::Float(_)) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => distance_to_equality_f64(x, y),
            _ => f64::MAX,
        },
        (Value::String(x), Value::String(y)) => left_alignment_distance(x, y),
        _ => {
            if a == b { 0.0 } else { f64::MAX }
        }
    }
}
