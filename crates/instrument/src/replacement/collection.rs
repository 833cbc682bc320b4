use std::sync::Arc;

use heurist_bytecode::Value;
use heurist_distance::distance::{heuristic_from_scaled_distance_with_base, value_distance};
use heurist_distance::{strings, DistanceError, HeuristicConfig, Truthness};
use heurist_vm::library::{COLLECTION, MAP};
use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    use ReplacementCategory::Base;
    vec![
        FnReplacement::new(
            (COLLECTION, "contains", "(Ljava/lang/Object;)Z"),
            ReplacementType::Collection,
            Base,
            false,
            collection_contains,
        ),
        FnReplacement::new(
            (COLLECTION, "isEmpty", "()Z"),
            ReplacementType::Boolean,
            Base,
            false,
            collection_is_empty,
        ),
        FnReplacement::new(
            (MAP, "containsKey", "(Ljava/lang/Object;)Z"),
            ReplacementType::Collection,
            Base,
            false,
            map_contains_key,
        ),
    ]
}

/// False with a gradient from a raw distance, never reaching 1.
pub(super) fn distance_truthness(cfg: &HeuristicConfig, distance: f64) -> Result<Truthness, DistanceError> {
    let h = heuristic_from_scaled_distance_with_base(cfg.not_null, distance.max(1.0))?;
    Truthness::taken_false(h.min(1.0 - f64::EPSILON))
}

/// Truthness of `needle` being among `items`: the closest element counts.
fn membership<'a>(
    cfg: &HeuristicConfig,
    items: impl ExactSizeIterator<Item = &'a Value>,
    needle: &Value,
) -> Result<Truthness, DistanceError> {
    if items.len() == 0 {
        return Truthness::taken_false(cfg.reached_but_empty);
    }
    let mut best = f64::MAX;
    for item in items {
        if item == needle {
            return Truthness::taken_true(cfg.not_empty);
        }
        best = best.min(value_distance(item, needle));
    }
    let h = heuristic_from_scaled_distance_with_base(cfg.not_empty, best.max(1.0))?;
    Truthness::taken_false(h.min(1.0 - f64::EPSILON))
}

/// Tainted lookups tell which constants the target looks for.
fn taint_elements<'a>(call: &ReplacementCall<'_>, items: impl Iterator<Item = &'a str>, needle: &Value) {
    let Some(needle) = needle.as_str() else {
        return;
    };
    if !call.tracer.taint_type(Some(needle)).is_full_match() {
        return;
    }
    for item in items {
        call.tracer.handle_taint_for_string_equals(Some(needle), Some(item), false);
    }
}

fn collection_contains(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(Value::List(items)) = call.arg(0) {
        let needle = call.arg(1).unwrap_or(&Value::Null);
        call.report(ReplacementType::Collection, membership(&call.heuristics, items.iter(), needle));
        taint_elements(call, items.iter().filter_map(Value::as_str), needle);
    }
    call.call_original()
}

fn collection_is_empty(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(Value::List(items)) = call.arg(0) {
        call.report(ReplacementType::Boolean, strings::truthness_to_empty(&call.heuristics, items.len()));
    }
    call.call_original()
}

fn map_contains_key(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(Value::Map(entries)) = call.arg(0) {
        let needle = call.arg(1).unwrap_or(&Value::Null);
        let keys: Vec<Value> = entries.keys().map(|k| Value::String(k.clone())).collect();
        call.report(ReplacementType::Collection, membership(&call.heuristics, keys.iter(), needle));
        taint_elements(call, entries.keys().map(String::as_str), needle);
    }
    call.call_original()
}
