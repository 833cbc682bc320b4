use std::sync::Arc;

use heurist_bytecode::Value;
use heurist_distance::{strings, Truthness};
use heurist_vm::library::{OBJECTS, PATTERN, STRING};
use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};
use crate::tracer::additional_info::{StringSpecialization, StringSpecializationInfo};

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    use ReplacementCategory::Base;
    use ReplacementType::Boolean;
    vec![
        FnReplacement::new((STRING, "equals", "(Ljava/lang/Object;)Z"), Boolean, Base, false, equals),
        FnReplacement::new(
            (STRING, "equalsIgnoreCase", "(Ljava/lang/String;)Z"),
            Boolean,
            Base,
            false,
            equals_ignore_case,
        ),
        FnReplacement::new((STRING, "startsWith", "(Ljava/lang/String;)Z"), Boolean, Base, false, starts_with),
        FnReplacement::new(
            (STRING, "startsWith", "(Ljava/lang/String;I)Z"),
            Boolean,
            Base,
            false,
            starts_with_offset,
        ),
        FnReplacement::new((STRING, "endsWith", "(Ljava/lang/String;)Z"), Boolean, Base, false, ends_with),
        FnReplacement::new((STRING, "isEmpty", "()Z"), Boolean, Base, false, is_empty),
        FnReplacement::new(
            (STRING, "contains", "(Ljava/lang/CharSequence;)Z"),
            Boolean,
            Base,
            false,
            contains,
        ),
        FnReplacement::new((STRING, "matches", "(Ljava/lang/String;)Z"), Boolean, Base, false, matches),
        FnReplacement::new(
            (PATTERN, "matches", "(Ljava/lang/String;Ljava/lang/CharSequence;)Z"),
            Boolean,
            Base,
            true,
            pattern_matches,
        ),
        FnReplacement::new(
            (OBJECTS, "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z"),
            Boolean,
            Base,
            true,
            objects_equals,
        ),
    ]
}

/// Report a specialization for `input` if it is tainted.
fn specialize(call: &ReplacementCall<'_>, input: &str, kind: StringSpecialization, value: String) {
    if call.tracer.is_taint_input(input) {
        // cannot fail, the input was just checked
        let _ = call
            .tracer
            .add_string_specialization(input, StringSpecializationInfo::new(kind, value));
    }
}

// A null receiver makes the original throw; there is nothing to report.

fn equals(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let other = call.arg(1).unwrap_or(&Value::Null);
        call.report(ReplacementType::Boolean, strings::equals(&call.heuristics, receiver, other));
        let other = other.as_str();
        call.tracer.handle_taint_for_string_equals(Some(receiver), other, false);
        call.tracer.handle_extra_param_taint(Some(receiver), other);
        call.tracer.handle_extra_header_taint(Some(receiver), other);
    }
    call.call_original()
}

fn equals_ignore_case(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let other = call.str_arg(1);
        call.report(
            ReplacementType::Boolean,
            strings::equals_ignore_case(&call.heuristics, receiver, other),
        );
        call.tracer.handle_taint_for_string_equals(Some(receiver), other, true);
        call.tracer.handle_extra_header_taint(Some(receiver), other);
    }
    call.call_original()
}

fn starts_with(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let prefix = call.str_arg(1);
        call.report(ReplacementType::Boolean, strings::starts_with(&call.heuristics, receiver, prefix, 0));
        if let Some(prefix) = prefix {
            specialize(call, receiver, StringSpecialization::RegexPartial, format!("^{}", regex::escape(prefix)));
        }
    }
    call.call_original()
}

fn starts_with_offset(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let offset = call.arg(2).and_then(Value::as_int).unwrap_or(0);
        call.report(
            ReplacementType::Boolean,
            strings::starts_with(&call.heuristics, receiver, call.str_arg(1), offset),
        );
    }
    call.call_original()
}

fn ends_with(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let suffix = call.str_arg(1);
        call.report(ReplacementType::Boolean, strings::ends_with(&call.heuristics, receiver, suffix));
        if let Some(suffix) = suffix {
            specialize(call, receiver, StringSpecialization::RegexPartial, format!("{}$", regex::escape(suffix)));
        }
    }
    call.call_original()
}

fn is_empty(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        call.report(ReplacementType::Boolean, strings::is_empty(&call.heuristics, receiver));
    }
    call.call_original()
}

fn contains(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(receiver) = call.str_arg(0) {
        let needle = call.str_arg(1);
        call.report(ReplacementType::Boolean, strings::contains(&call.heuristics, receiver, needle));
        if let Some(needle) = needle {
            specialize(call, receiver, StringSpecialization::RegexPartial, regex::escape(needle));
        }
    }
    call.call_original()
}

fn report_matches(call: &ReplacementCall<'_>, input: &str, regex: &str) {
    let t = if call.tracer.is_too_many_expensive_operations() {
        strings::matches_without_distance(&call.heuristics, input, regex)
    } else {
        call.tracer.increase_expensive_operation_count();
        strings::matches(&call.heuristics, input, regex)
    };
    call.report(ReplacementType::Boolean, t);
    specialize(call, input, StringSpecialization::RegexWhole, regex.to_string());
}

fn matches(call: &ReplacementCall<'_>) -> NativeResult {
    if let (Some(receiver), Some(regex)) = (call.str_arg(0), call.str_arg(1)) {
        report_matches(call, receiver, regex);
    }
    call.call_original()
}

fn pattern_matches(call: &ReplacementCall<'_>) -> NativeResult {
    if let (Some(regex), Some(input)) = (call.str_arg(0), call.str_arg(1)) {
        report_matches(call, input, regex);
    }
    call.call_original()
}

fn objects_equals(call: &ReplacementCall<'_>) -> NativeResult {
    let null = Value::Null;
    let left = call.arg(0).unwrap_or(&null);
    let right = call.arg(1).unwrap_or(&null);
    let cfg = &call.heuristics;
    let t = match (left, right) {
        (a, b) if a == b => Truthness::taken_true(cfg.not_null),
        (Value::String(a), b) => strings::equals(cfg, a, b),
        (Value::Null, _) | (_, Value::Null) => Truthness::taken_false(cfg.reached_but_null),
        (a, b) => super::collection::distance_truthness(cfg, heurist_distance::distance::value_distance(a, b)),
    };
    call.report(ReplacementType::Boolean, t);
    call.tracer.handle_taint_for_string_equals(left.as_str(), right.as_str(), false);
    call.call_original()
}
