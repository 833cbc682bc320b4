//! Trackers for request input and JSON body parsing.

use std::sync::Arc;

use heurist_bytecode::{ClassName, Value};
use heurist_vm::library::{GSON, SERVLET_REQUEST};
use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};
use crate::tracer::additional_info::{StringSpecialization, StringSpecializationInfo};

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    use ReplacementCategory::Ext0;
    use ReplacementType::Tracker;
    vec![
        FnReplacement::new(
            (SERVLET_REQUEST, "getParameter", "(Ljava/lang/String;)Ljava/lang/String;"),
            Tracker,
            Ext0,
            false,
            get_parameter,
        ),
        FnReplacement::new(
            (SERVLET_REQUEST, "getHeader", "(Ljava/lang/String;)Ljava/lang/String;"),
            Tracker,
            Ext0,
            false,
            get_header,
        ),
        FnReplacement::new(
            (GSON, "fromJson", "(Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;"),
            Tracker,
            Ext0,
            true,
            gson_from_json,
        ),
    ]
}

fn get_parameter(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(name) = call.str_arg(1) {
        call.tracer.add_query_parameter(name);
    }
    call.call_original()
}

fn get_header(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(name) = call.str_arg(1) {
        call.tracer.add_header(name);
    }
    call.call_original()
}

/// `fromJson(json, Dto.class)`, called without a `Gson` instance. Class
/// literals are their name.
fn gson_from_json(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(class) = call.arg(1).and_then(Value::as_str) {
        let name = ClassName::new(class).full_name_with_dots();
        call.tracer.add_parsed_dto_name(&name);
        call.units.register_parsed_dto(&name, None);
        if let Some(json) = call.str_arg(0).filter(|j| call.tracer.is_taint_input(j)) {
            let _ = call.tracer.add_string_specialization(
                json,
                StringSpecializationInfo::new(StringSpecialization::JsonObject, name),
            );
        }
    }
    call.call_original()
}
