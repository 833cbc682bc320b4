use std::sync::Arc;

use heurist_distance::distance::heuristic_from_scaled_distance_with_base;
use heurist_distance::{DistanceError, HeuristicConfig, Truthness};
use heurist_vm::library::{check_uri, INET_ADDRESS, URI, URL};
use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};
use crate::tracer::additional_info::{
    ExternalServiceInfo, HostnameResolutionInfo, StringSpecialization, StringSpecializationInfo,
};

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    vec![
        FnReplacement::new(
            (URI, "create", "(Ljava/lang/String;)Ljava/net/URI;"),
            ReplacementType::Exception,
            ReplacementCategory::Base,
            true,
            uri_create,
        ),
        FnReplacement::new(
            (INET_ADDRESS, "getByName", "(Ljava/lang/String;)Ljava/net/InetAddress;"),
            ReplacementType::Tracker,
            ReplacementCategory::Net,
            true,
            inet_get_by_name,
        ),
        FnReplacement::new(
            (URL, "openConnection", "()Ljava/net/URLConnection;"),
            ReplacementType::Tracker,
            ReplacementCategory::Net,
            false,
            url_open_connection,
        ),
    ]
}

const ILLEGAL_URI_CHARS: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// True side means `URI.create` does not throw. The gradient counts
/// characters that are illegal anywhere in a URI.
fn uri_truthness(cfg: &HeuristicConfig, input: Option<&str>) -> Result<Truthness, DistanceError> {
    let Some(input) = input else {
        return Truthness::taken_false(cfg.reached_but_null);
    };
    if check_uri(input).is_ok() {
        return Truthness::taken_true(cfg.not_null);
    }
    let illegal = input
        .chars()
        .filter(|c| c.is_whitespace() || ILLEGAL_URI_CHARS.contains(c))
        .count();
    let h = heuristic_from_scaled_distance_with_base(cfg.not_null, illegal.max(1) as f64)?;
    Truthness::taken_false(h.min(1.0 - f64::EPSILON))
}

fn uri_create(call: &ReplacementCall<'_>) -> NativeResult {
    let input = call.str_arg(0);
    if let Some(s) = input.filter(|s| call.tracer.is_taint_input(s)) {
        let _ = call
            .tracer
            .add_string_specialization(s, StringSpecializationInfo::new(StringSpecialization::Uri, ""));
    }
    call.report(ReplacementType::Exception, uri_truthness(&call.heuristics, input));
    call.call_original()
}

fn inet_get_by_name(call: &ReplacementCall<'_>) -> NativeResult {
    let result = call.call_original();
    if let Some(host) = call.str_arg(0) {
        call.tracer.add_hostname_info(HostnameResolutionInfo {
            hostname: host.to_string(),
            resolved: result.is_ok(),
        });
    }
    result
}

fn url_open_connection(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(parsed) = call.str_arg(0).and_then(|s| url::Url::parse(s).ok()) {
        if let Some(host) = parsed.host_str() {
            call.tracer.add_external_service(ExternalServiceInfo {
                protocol: parsed.scheme().to_string(),
                hostname: host.to_string(),
                port: parsed.port_or_known_default(),
            });
        }
    }
    call.call_original()
}
