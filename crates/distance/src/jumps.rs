//! Truthness of conditional jumps, computed from the operands on the stack
//! right before the jump executes.
//!
//! The `of_true` side of the result always refers to the jump being taken.

use heurist_bytecode::{JumpKind, Value};

use crate::distance::distance_to_equality_i64;
use crate::error::DistanceError;
use crate::heuristic::HeuristicConfig;
use crate::truthness::Truthness;

/// `ifeq`..`ifle`: compares a single int against zero.
pub fn for_single_value_jump(
    cfg: &HeuristicConfig,
    value: i64,
    kind: JumpKind,
) -> Result<Truthness, DistanceError> {
    let as_cmp = match kind {
        JumpKind::Ifeq => JumpKind::IfIcmpeq,
        JumpKind::Ifne => JumpKind::IfIcmpne,
        JumpKind::Iflt => JumpKind::IfIcmplt,
        JumpKind::Ifge => JumpKind::IfIcmpge,
        JumpKind::Ifgt => JumpKind::IfIcmpgt,
        JumpKind::Ifle => JumpKind::IfIcmple,
        other => return Err(DistanceError::UnsupportedJump(other)),
    };
    for_value_comparison(cfg, value, 0, as_cmp)
}

/// `if_icmpeq`..`if_icmple`: `first <op> second`.
pub fn for_value_comparison(
    cfg: &HeuristicConfig,
    first: i64,
    second: i64,
    kind: JumpKind,
) -> Result<Truthness, DistanceError> {
    match kind {
        JumpKind::IfIcmpeq => equality(cfg, first, second),
        JumpKind::IfIcmpne => Ok(equality(cfg, first, second)?.invert()),
        JumpKind::IfIcmplt => less_than(cfg, first, second),
        JumpKind::IfIcmpge => Ok(less_than(cfg, first, second)?.invert()),
        // a <= b is !(b < a)
        JumpKind::IfIcmple => Ok(less_than(cfg, second, first)?.invert()),
        JumpKind::IfIcmpgt => less_than(cfg, second, first),
        other => Err(DistanceError::UnsupportedJump(other)),
    }
}

/// `ifnull` / `ifnonnull`.
pub fn for_null_comparison(
    cfg: &HeuristicConfig,
    value: &Value,
    kind: JumpKind,
) -> Result<Truthness, DistanceError> {
    let is_null = if value.is_null() {
        Truthness::taken_true(cfg.not_null)?
    } else {
        Truthness::taken_false(cfg.reached_but_null)?
    };
    match kind {
        JumpKind::Ifnull => Ok(is_null),
        JumpKind::Ifnonnull => Ok(is_null.invert()),
        other => Err(DistanceError::UnsupportedJump(other)),
    }
}

/// `if_acmpeq` / `if_acmpne`. There is no gradient between two references,
/// so both sides get the same constant.
pub fn for_object_comparison(
    cfg: &HeuristicConfig,
    first: &Value,
    second: &Value,
    kind: JumpKind,
) -> Result<Truthness, DistanceError> {
    let same = if first == second {
        Truthness::taken_true(cfg.not_null)?
    } else {
        Truthness::taken_false(cfg.not_null)?
    };
    match kind {
        JumpKind::IfAcmpeq => Ok(same),
        JumpKind::IfAcmpne => Ok(same.invert()),
        other => Err(DistanceError::UnsupportedJump(other)),
    }
}

fn equality(cfg: &HeuristicConfig, a: i64, b: i64) -> Result<Truthness, DistanceError> {
    if a == b {
        Truthness::taken_true(cfg.score(0.0)?)
    } else {
        Truthness::taken_false(cfg.score(distance_to_equality_i64(a, b))?)
    }
}

fn less_than(cfg: &HeuristicConfig, a: i64, b: i64) -> Result<Truthness, DistanceError> {
    if a < b {
        // flipping needs a to grow to b
        Truthness::taken_true(cfg.score(distance_to_equality_i64(a, b))?)
    } else {
        Truthness::taken_false(cfg.score(distance_to_equality_i64(a, b))?)
    }
}
