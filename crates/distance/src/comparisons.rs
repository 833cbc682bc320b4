use heurist_bytecode::CmpKind;
use serde::{Deserialize, Serialize};

use crate::distance::{distance_to_equality_f64, distance_to_equality_i64, increased_distance};
use crate::error::DistanceError;
use crate::heuristic::HeuristicConfig;
use crate::truthness::Truthness;

/// The three outcomes of one `compareTo`-style comparison.
///
/// Exactly one of `less`, `equal`, `greater` is true. The other two grade
/// how close the operands were to producing that outcome instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericComparison {
    pub less: Truthness,
    pub equal: Truthness,
    pub greater: Truthness,
}

impl NumericComparison {
    /// The value the comparison instruction pushes.
    pub fn result(&self) -> i64 {
        if self.less.is_true() {
            -1
        } else if self.equal.is_true() {
            0
        } else {
            1
        }
    }

    fn from_ordering(
        cfg: &HeuristicConfig,
        ordering: Option<std::cmp::Ordering>,
        distance: f64,
    ) -> Result<Self, DistanceError> {
        use std::cmp::Ordering;
        match ordering {
            Some(Ordering::Equal) => Ok(NumericComparison {
                less: Truthness::taken_false(cfg.reached)?,
                equal: Truthness::taken_true(cfg.score(0.0)?)?,
                greater: Truthness::taken_false(cfg.reached)?,
            }),
            Some(Ordering::Less) => {
                let to_equal = cfg.score(distance)?;
                let to_greater = cfg.score(increased_distance(distance, 1.0)?)?;
                Ok(NumericComparison {
                    less: Truthness::taken_true(to_equal)?,
                    equal: Truthness::taken_false(to_equal)?,
                    greater: Truthness::taken_false(to_greater)?,
                })
            }
            Some(Ordering::Greater) => {
                let to_equal = cfg.score(distance)?;
                let to_less = cfg.score(increased_distance(distance, 1.0)?)?;
                Ok(NumericComparison {
                    less: Truthness::taken_false(to_less)?,
                    equal: Truthness::taken_false(to_equal)?,
                    greater: Truthness::taken_true(to_equal)?,
                })
            }
            None => Err(DistanceError::NegativeDistance(f64::NAN)),
        }
    }
}

/// `lcmp`.
pub fn compare_i64(cfg: &HeuristicConfig, a: i64, b: i64) -> Result<NumericComparison, DistanceError> {
    NumericComparison::from_ordering(cfg, Some(a.cmp(&b)), distance_to_equality_i64(a, b))
}

/// `fcmpl`, `fcmpg`, `dcmpl`, `dcmpg`. A NaN operand makes the instruction
/// push its fixed NaN result, which is reported as true with every other
/// outcome at the floor.
pub fn compare_f64(
    cfg: &HeuristicConfig,
    a: f64,
    b: f64,
    kind: CmpKind,
) -> Result<NumericComparison, DistanceError> {
    if a.is_nan() || b.is_nan() {
        let floor = Truthness::taken_false(cfg.reached)?;
        let hit = Truthness::taken_true(cfg.reached)?;
        return Ok(if kind.nan_result() < 0 {
            NumericComparison { less: hit, equal: floor, greater: floor }
        } else {
            NumericComparison { less: floor, equal: floor, greater: hit }
        });
    }
    NumericComparison::from_ordering(cfg, a.partial_cmp(&b), distance_to_equality_f64(a, b))
}
