//! Recognising input values injected by the search so that their flow into
//! comparisons can be reported back.

use serde::{Deserialize, Serialize};

pub const PREFIX: &str = "_EM_";
pub const POSTFIX: &str = "_XYZ_";

/// Value given to an unknown query parameter; comparing a name against it
/// reveals which parameters the target reads.
pub const EXTRA_PARAM_TAINT: &str = "EMextraParam123";
pub const EXTRA_HEADER_TAINT: &str = "EMextraHeader123";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaintType {
    None,
    FullMatch,
    PartialMatch,
}

impl TaintType {
    pub fn is_tainted(&self) -> bool {
        *self != TaintType::None
    }

    pub fn is_full_match(&self) -> bool {
        *self == TaintType::FullMatch
    }
}

/// The `index`-th taint input name, e.g. `_EM_3_XYZ_`.
pub fn taint_name(index: usize) -> String {
    format!("{PREFIX}{index}{POSTFIX}")
}

/// Whether `value` is exactly a taint input name. Case is ignored, some
/// targets upper- or lower-case their inputs.
pub fn is_taint_input(value: &str) -> bool {
    match_at(value.as_bytes(), 0) == Some(value.len())
}

/// Whether a taint input name occurs anywhere in `value`.
pub fn includes_taint_input(value: &str) -> bool {
    let bytes = value.as_bytes();
    (0..bytes.len()).any(|i| match_at(bytes, i).is_some())
}

/// End offset of a taint name starting at `start`.
fn match_at(bytes: &[u8], start: usize) -> Option<usize> {
    let rest = bytes.get(start..)?;
    if rest.len() < PREFIX.len() || !rest[..PREFIX.len()].eq_ignore_ascii_case(PREFIX.as_bytes()) {
        return None;
    }
    let digits = rest[PREFIX.len()..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let tail = &rest[PREFIX.len() + digits..];
    if tail.len() < POSTFIX.len() || !tail[..POSTFIX.len()].eq_ignore_ascii_case(POSTFIX.as_bytes()) {
        return None;
    }
    Some(start + PREFIX.len() + digits + POSTFIX.len())
}
