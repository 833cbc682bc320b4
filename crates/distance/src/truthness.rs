use serde::{Deserialize, Serialize};

use crate::error::DistanceError;

/// How true and how false a boolean decision was.
///
/// Both values are in `[0,1]` and exactly one of them is 1: the side that
/// was actually taken. The other one measures how close the evaluation
/// came to flipping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truthness {
    of_true: f64,
    of_false: f64,
}

impl Truthness {
    pub fn new(of_true: f64, of_false: f64) -> Result<Self, DistanceError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        let exactly_one = (of_true == 1.0) != (of_false == 1.0);
        if !in_range(of_true) || !in_range(of_false) || !exactly_one {
            return Err(DistanceError::InvalidTruthness { of_true, of_false });
        }
        Ok(Truthness { of_true, of_false })
    }

    /// A decision that evaluated to true, `of_false` away from being false.
    pub fn taken_true(of_false: f64) -> Result<Self, DistanceError> {
        Truthness::new(1.0, of_false)
    }

    /// A decision that evaluated to false, `of_true` away from being true.
    pub fn taken_false(of_true: f64) -> Result<Self, DistanceError> {
        Truthness::new(of_true, 1.0)
    }

    pub fn of_true(&self) -> f64 {
        self.of_true
    }

    pub fn of_false(&self) -> f64 {
        self.of_false
    }

    pub fn is_true(&self) -> bool {
        self.of_true == 1.0
    }

    pub fn is_false(&self) -> bool {
        self.of_false == 1.0
    }

    pub fn invert(&self) -> Truthness {
        Truthness {
            of_true: self.of_false,
            of_false: self.of_true,
        }
    }
}
