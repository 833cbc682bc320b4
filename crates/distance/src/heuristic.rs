use serde::{Deserialize, Serialize};

use crate::error::DistanceError;

pub const DEFAULT_REACHED: f64 = 0.2;
pub const DEFAULT_BOUNDARY_DELTA: f64 = 0.1;
pub const DEFAULT_REACHED_BUT_NULL: f64 = 0.05;
pub const DEFAULT_NOT_NULL: f64 = 0.1;
pub const DEFAULT_REACHED_BUT_EMPTY: f64 = 0.05;
pub const DEFAULT_NOT_EMPTY: f64 = 0.1;

/// Maps a non-negative distance into `[0,1)`, strictly increasing.
pub fn normalize(distance: f64) -> Result<f64, DistanceError> {
    if distance.is_nan() || distance < 0.0 {
        return Err(DistanceError::NegativeDistance(distance));
    }
    if distance.is_infinite() {
        return Ok(1.0);
    }
    Ok(distance / (distance + 1.0))
}

/// Calibration constants for every heuristic in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Floor for any executed comparison.
    pub reached: f64,
    /// Added to a distance before scoring so that distance 0 on the not
    /// taken side stays strictly below 1.
    pub boundary_delta: f64,
    pub reached_but_null: f64,
    pub not_null: f64,
    pub reached_but_empty: f64,
    pub not_empty: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        HeuristicConfig {
            reached: DEFAULT_REACHED,
            boundary_delta: DEFAULT_BOUNDARY_DELTA,
            reached_but_null: DEFAULT_REACHED_BUT_NULL,
            not_null: DEFAULT_NOT_NULL,
            reached_but_empty: DEFAULT_REACHED_BUT_EMPTY,
            not_empty: DEFAULT_NOT_EMPTY,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<(), DistanceError> {
        let bases = [
            ("reached", self.reached),
            ("reached_but_null", self.reached_but_null),
            ("not_null", self.not_null),
            ("reached_but_empty", self.reached_but_empty),
            ("not_empty", self.not_empty),
        ];
        for (name, v) in bases {
            if !(v > 0.0 && v < 1.0) {
                return Err(DistanceError::InvalidConfig(format!(
                    "{name} must be in (0,1), got {v}"
                )));
            }
        }
        if !(self.boundary_delta > 0.0 && self.boundary_delta.is_finite()) {
            return Err(DistanceError::InvalidConfig(format!(
                "boundary_delta must be positive, got {}",
                self.boundary_delta
            )));
        }
        Ok(())
    }

    /// `reached + (1 - reached) * (1 - normalize(d + boundary_delta))`.
    ///
    /// Lies in `(reached, 1)` and tends to `reached` as the distance grows.
    /// Distances too large to resolve in `f64` (infinite included) score the
    /// smallest value above `reached`.
    pub fn score(&self, distance: f64) -> Result<f64, DistanceError> {
        if distance.is_nan() || distance < 0.0 {
            return Err(DistanceError::NegativeDistance(distance));
        }
        let n = normalize(distance + self.boundary_delta)?;
        let floor = f64::from_bits(self.reached.to_bits() + 1);
        Ok((self.reached + (1.0 - self.reached) * (1.0 - n)).max(floor))
    }
}
