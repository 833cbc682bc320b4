use std::sync::Arc;

use heurist_distance::numbers;
use heurist_vm::library::{DOUBLE, INTEGER, LONG};
use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};
use crate::tracer::additional_info::{StringSpecialization, StringSpecializationInfo};

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    use ReplacementCategory::Base;
    use ReplacementType::Exception;
    vec![
        FnReplacement::new((INTEGER, "parseInt", "(Ljava/lang/String;)I"), Exception, Base, true, parse_int),
        FnReplacement::new((LONG, "parseLong", "(Ljava/lang/String;)J"), Exception, Base, true, parse_long),
        FnReplacement::new(
            (DOUBLE, "parseDouble", "(Ljava/lang/String;)D"),
            Exception,
            Base,
            true,
            parse_double,
        ),
    ]
}

fn specialize_input(call: &ReplacementCall<'_>, kind: StringSpecialization) {
    if let Some(input) = call.str_arg(0) {
        if call.tracer.is_taint_input(input) {
            let _ = call
                .tracer
                .add_string_specialization(input, StringSpecializationInfo::new(kind, ""));
        }
    }
}

fn parse_int(call: &ReplacementCall<'_>) -> NativeResult {
    specialize_input(call, StringSpecialization::Integer);
    call.report(ReplacementType::Exception, numbers::parse_int(&call.heuristics, call.str_arg(0)));
    call.call_original()
}

fn parse_long(call: &ReplacementCall<'_>) -> NativeResult {
    specialize_input(call, StringSpecialization::Long);
    call.report(ReplacementType::Exception, numbers::parse_long(&call.heuristics, call.str_arg(0)));
    call.call_original()
}

fn parse_double(call: &ReplacementCall<'_>) -> NativeResult {
    specialize_input(call, StringSpecialization::Double);
    call.report(ReplacementType::Exception, numbers::parse_double(&call.heuristics, call.str_arg(0)));
    call.call_original()
}
