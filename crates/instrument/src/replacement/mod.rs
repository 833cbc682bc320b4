//! Instrumented stand-ins for library methods.
//!
//! A replaced call site passes the original arguments plus an objective id
//! template to a native under [`REPLACEMENT_OWNER`]. That native computes a
//! heuristic for the call's outcome, reports it with any taint it sees, and
//! then delegates to the original native, so results and exceptions are
//! exactly those of the original.

mod collection;
mod net;
mod number;
mod servlet;
mod storage;
mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use heurist_bytecode::{BytecodeError, FieldType, MethodDescriptor, Value};
use heurist_distance::{DistanceError, HeuristicConfig, Truthness};
use heurist_vm::{MethodKey, NativeError, NativeFn, NativeRegistry, NativeResult};
use tracing::{debug, warn};

use crate::category::{ReplacementCategory, ReplacementType};
use crate::config::{self, InstrumentationConfig};
use crate::tracer::ExecutionTracer;
use crate::units::UnitsInfoRecorder;

pub use storage::{MONGO_COLLECTION, SQL_STATEMENT, JEDIS};

pub const REPLACEMENT_OWNER: &str = "org/heurist/instrumentation/MethodReplacement";

/// Everything a replacement gets for one intercepted call.
pub struct ReplacementCall<'a> {
    /// Original arguments, receiver first for instance methods.
    pub args: &'a [Value],
    /// `None` at third-party call sites and for trackers.
    pub id_template: Option<&'a str>,
    pub original: &'a NativeFn,
    pub tracer: &'a ExecutionTracer,
    pub units: &'a UnitsInfoRecorder,
    pub heuristics: HeuristicConfig,
}

impl ReplacementCall<'_> {
    pub fn call_original(&self) -> NativeResult {
        (self.original)(self.args)
    }

    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.args.get(i)
    }

    pub fn str_arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).and_then(Value::as_str)
    }

    /// Report the heuristic for the call outcome, if the call site has
    /// objectives. Heuristic failures are logged, never raised.
    pub fn report(&self, kind: ReplacementType, t: Result<Truthness, DistanceError>) {
        let Some(template) = self.id_template else {
            return;
        };
        let result = t
            .map_err(|e| e.to_string())
            .and_then(|t| {
                self.tracer
                    .executed_replaced_method(template, kind, &t)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(template, error = %e, "cannot report method replacement");
        }
    }
}

pub trait MethodReplacement: Send + Sync {
    /// The library method this one stands in for.
    fn target(&self) -> MethodKey;

    fn replacement_type(&self) -> ReplacementType;

    fn category(&self) -> ReplacementCategory;

    /// Whether the target is static. Instance call sites pass the receiver
    /// as the first argument.
    fn is_static(&self) -> bool;

    fn invoke(&self, call: &ReplacementCall<'_>) -> NativeResult;
}

/// A replacement given by a plain function.
pub struct FnReplacement {
    target: MethodKey,
    kind: ReplacementType,
    category: ReplacementCategory,
    is_static: bool,
    body: fn(&ReplacementCall<'_>) -> NativeResult,
}

impl FnReplacement {
    pub fn new(
        (owner, name, descriptor): (&str, &str, &str),
        kind: ReplacementType,
        category: ReplacementCategory,
        is_static: bool,
        body: fn(&ReplacementCall<'_>) -> NativeResult,
    ) -> Arc<dyn MethodReplacement> {
        Arc::new(FnReplacement {
            target: MethodKey::new(owner, name, descriptor),
            kind,
            category,
            is_static,
            body,
        })
    }
}

impl MethodReplacement for FnReplacement {
    fn target(&self) -> MethodKey {
        self.target.clone()
    }

    fn replacement_type(&self) -> ReplacementType {
        self.kind
    }

    fn category(&self) -> ReplacementCategory {
        self.category
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn invoke(&self, call: &ReplacementCall<'_>) -> NativeResult {
        (self.body)(call)
    }
}

/// The native a rewritten call site invokes for `replacement`.
pub fn replacement_key(replacement: &dyn MethodReplacement) -> Result<MethodKey, BytecodeError> {
    let target = replacement.target();
    let desc = MethodDescriptor::parse(&target.descriptor)?;
    let desc = if replacement.is_static() { desc } else { desc.with_receiver(&target.owner) };
    let desc = desc.with_appended(FieldType::Object("java/lang/String".into()));
    Ok(MethodKey::new(
        REPLACEMENT_OWNER,
        &format!("{}.{}", target.owner, target.name),
        &desc.to_string(),
    ))
}

#[derive(Clone, Default)]
pub struct ReplacementRegistry {
    by_target: HashMap<MethodKey, Arc<dyn MethodReplacement>>,
}

impl fmt::Debug for ReplacementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacementRegistry")
            .field("replacements", &self.by_target.len())
            .finish()
    }
}

impl ReplacementRegistry {
    pub fn new() -> Self {
        ReplacementRegistry::default()
    }

    /// Every replacement shipped with the crate.
    pub fn with_defaults() -> Self {
        let mut registry = ReplacementRegistry::new();
        for r in string::replacements()
            .into_iter()
            .chain(number::replacements())
            .chain(collection::replacements())
            .chain(net::replacements())
            .chain(servlet::replacements())
            .chain(storage::replacements())
        {
            registry.register(r);
        }
        registry
    }

    pub fn register(&mut self, replacement: Arc<dyn MethodReplacement>) {
        self.by_target.insert(replacement.target(), replacement);
    }

    pub fn get(&self, target: &MethodKey) -> Option<&Arc<dyn MethodReplacement>> {
        self.by_target.get(target)
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    /// Replacements in enabled categories whose original is available.
    pub fn active(&self, config: &InstrumentationConfig, natives: &NativeRegistry) -> ReplacementRegistry {
        let by_target = self
            .by_target
            .iter()
            .filter(|(key, r)| config.is_enabled(r.category()) && natives.contains(key))
            .map(|(key, r)| (key.clone(), r.clone()))
            .collect();
        ReplacementRegistry { by_target }
    }

    /// Register the native of every replacement, wrapping the original
    /// found in `natives`.
    pub fn install(
        &self,
        natives: &mut NativeRegistry,
        tracer: Arc<ExecutionTracer>,
        units: Arc<UnitsInfoRecorder>,
    ) -> Result<(), BytecodeError> {
        for (target, replacement) in &self.by_target {
            let Some(original) = natives.resolve(target) else {
                debug!(%target, "no original native, replacement not installed");
                continue;
            };
            let key = replacement_key(replacement.as_ref())?;
            let replacement = replacement.clone();
            let tracer = tracer.clone();
            let units = units.clone();
            let native: Arc<NativeFn> = Arc::new(move |args: &[Value]| {
                if tracer.is_kill_switch() {
                    return Err(NativeError::Abort("kill switch is on (method replacement)".into()));
                }
                let (template, args) = match args.split_last() {
                    Some((Value::String(t), rest)) => (Some(t.as_str()), rest),
                    Some((_, rest)) => (None, rest),
                    None => (None, args),
                };
                let call = ReplacementCall {
                    args,
                    id_template: template,
                    original: original.as_ref(),
                    tracer: &tracer,
                    units: &units,
                    heuristics: config::heuristics(),
                };
                replacement.invoke(&call)
            });
            natives.register_arc(key, native);
        }
        Ok(())
    }
}
