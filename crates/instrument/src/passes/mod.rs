//! The rewriting pipeline applied to every loaded class.
//!
//! Each method is lifted into a [`MethodBody`], run through the passes in
//! order, lowered and verified. Any failure leaves the method exactly as it
//! was and only costs its objectives.

mod branch;
mod comparison;
mod line;
mod replacement;
mod success_call;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use heurist_bytecode::{verify, ClassFile, ClassName, InvokeKind, Method, MethodRef, Op, Value};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cfg::ControlFlowGraph;
use crate::config::{InstrumentationConfig, INTERNAL_PACKAGE};
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::naming;
use crate::probes::PROBE_OWNER;
use crate::recorder::ObjectiveRecorder;
use crate::replacement::ReplacementRegistry;
use crate::schema;
use crate::units::UnitsInfoRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Pass {
    Line,
    SuccessCall,
    Branch,
    NumericComparison,
    MethodReplacement,
}

impl Pass {
    /// Pipeline for classes of the system under test.
    pub const SUT: [Pass; 5] = [
        Pass::Line,
        Pass::SuccessCall,
        Pass::Branch,
        Pass::NumericComparison,
        Pass::MethodReplacement,
    ];

    /// Third-party classes only report taint through replacements.
    pub const THIRD_PARTY: [Pass; 1] = [Pass::MethodReplacement];

    fn run(self, ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
        match self {
            Pass::Line => line::run(ctx, body),
            Pass::SuccessCall => success_call::run(ctx, body),
            Pass::Branch => branch::run(ctx, body),
            Pass::NumericComparison => comparison::run(ctx, body),
            Pass::MethodReplacement => replacement::run(ctx, body),
        }
    }
}

/// Objectives a method contributes, registered only once it is rewritten.
#[derive(Debug, Default)]
struct MethodObjectives {
    targets: Vec<String>,
    lines: BTreeSet<u32>,
    branch_pairs: usize,
    success_calls: usize,
    numeric_comparisons: usize,
    replaced: usize,
    tracked: usize,
    dependencies: Vec<(String, String)>,
}

/// Position of each inserted call among those of its kind on the same source line.
/// Shared by all methods of a class: a lambda body and its enclosing method
/// can sit on the same line.
#[derive(Debug, Default)]
struct LinePositions {
    counters: HashMap<(Pass, u32), u32>,
}

impl LinePositions {
    fn next(&mut self, pass: Pass, line: u32) -> u32 {
        let counter = self.counters.entry((pass, line)).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

struct PassContext<'a> {
    class: &'a mut ClassFile,
    /// Class name with dots, as reported to probes.
    class_name: String,
    method: Method,
    /// Source line in effect at each instruction.
    lines: Vec<Option<u32>>,
    cfg: ControlFlowGraph,
    is_sut: bool,
    replacements: &'a ReplacementRegistry,
    positions: &'a mut LinePositions,
    objectives: MethodObjectives,
}

impl PassContext<'_> {
    fn push(&mut self, value: Value) -> Op {
        Op::PushConst(self.class.add_const(value))
    }

    fn push_str(&mut self, s: &str) -> Op {
        self.push(Value::String(s.to_string()))
    }

    fn push_int(&mut self, n: i64) -> Op {
        self.push(Value::Int(n))
    }

    fn probe(&mut self, name: &str, descriptor: &str) -> Op {
        Op::Invoke(self.class.add_method_ref(MethodRef::new(
            InvokeKind::Static,
            PROBE_OWNER,
            name,
            descriptor,
        )))
    }

    fn original_code(&self) -> &[Op] {
        &self.method.code
    }
}

fn line_table(code: &[Op]) -> Vec<Option<u32>> {
    let mut current = None;
    code.iter()
        .map(|op| {
            if let Op::Line(n) = op {
                current = Some(*n);
            }
            current
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMethod {
    pub name: String,
    pub descriptor: String,
    pub reason: String,
}

/// Outcome of instrumenting one class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassReport {
    pub class_name: String,
    pub is_sut: bool,
    pub instrumented_methods: Vec<String>,
    pub skipped_methods: Vec<SkippedMethod>,
    pub objectives: usize,
}

pub struct Instrumenter {
    config: InstrumentationConfig,
    replacements: ReplacementRegistry,
    recorder: Arc<ObjectiveRecorder>,
    units: Arc<UnitsInfoRecorder>,
}

impl Instrumenter {
    /// `replacements` should only hold the active replacements.
    pub fn new(
        config: InstrumentationConfig,
        replacements: ReplacementRegistry,
        recorder: Arc<ObjectiveRecorder>,
        units: Arc<UnitsInfoRecorder>,
    ) -> Self {
        Instrumenter { config, replacements, recorder, units }
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// Rewrite every method of `class` that can be rewritten safely.
    pub fn instrument(&self, class: &ClassFile) -> (ClassFile, ClassReport) {
        let class_name = ClassName::new(&class.name).full_name_with_dots();
        let mut out = class.clone();
        let mut report = ClassReport { class_name: class_name.clone(), ..ClassReport::default() };
        if class_name.starts_with(INTERNAL_PACKAGE) {
            return (out, report);
        }

        let is_sut = self.config.is_sut(&class.name);
        report.is_sut = is_sut;
        let passes: &[Pass] = if is_sut { &Pass::SUT } else { &Pass::THIRD_PARTY };
        if is_sut {
            self.units.mark_new_unit(&class_name);
            if !class.fields.is_empty() {
                match schema::class_to_schema(class) {
                    Ok(s) => self.units.add_known_schema(&class_name, s),
                    Err(e) => warn!(class = %class_name, error = %e, "cannot derive schema"),
                }
            }
        }

        let mut class_lines = BTreeSet::new();
        let mut class_targets = BTreeSet::new();
        let mut positions = LinePositions::default();
        for index in 0..out.methods.len() {
            let method = out.methods[index].clone();
            let saved_constants = out.constants.len();
            let saved_refs = out.method_refs.len();
            match self.instrument_method(&mut out, &method, &class_name, is_sut, passes, &mut positions) {
                Ok((code, objectives)) => {
                    out.methods[index].code = code;
                    let verified = verify::verify_method(&out, &out.methods[index]);
                    if let Err(e) = verified {
                        out.methods[index].code = method.code.clone();
                        out.constants.truncate(saved_constants);
                        out.method_refs.truncate(saved_refs);
                        warn!(class = %class_name, method = %method.name, error = %e,
                            "instrumented method fails verification, left unmodified");
                        report.skipped_methods.push(skipped(&method, e.to_string()));
                        continue;
                    }
                    class_targets.extend(objectives.targets.iter().cloned());
                    class_lines.extend(objectives.lines.iter().copied());
                    self.commit(objectives, is_sut);
                    report.instrumented_methods.push(format!("{}{}", method.name, method.descriptor));
                }
                Err(e) => {
                    out.constants.truncate(saved_constants);
                    out.method_refs.truncate(saved_refs);
                    warn!(class = %class_name, method = %method.name, error = %e,
                        "cannot instrument method, left unmodified");
                    report.skipped_methods.push(skipped(&method, e.to_string()));
                }
            }
        }
        report.objectives = class_targets.len();
        self.units.mark_new_lines(class_lines.len());
        debug!(
            class = %class_name,
            methods = report.instrumented_methods.len(),
            skipped = report.skipped_methods.len(),
            objectives = report.objectives,
            "instrumented class"
        );
        (out, report)
    }

    fn instrument_method(
        &self,
        class: &mut ClassFile,
        method: &Method,
        class_name: &str,
        is_sut: bool,
        passes: &[Pass],
        positions: &mut LinePositions,
    ) -> Result<(Vec<Op>, MethodObjectives), InstrumentError> {
        let mut body = MethodBody::lift(&method.code);
        let mut ctx = PassContext {
            class,
            class_name: class_name.to_string(),
            method: method.clone(),
            lines: line_table(&method.code),
            cfg: ControlFlowGraph::build(&method.code),
            is_sut,
            replacements: &self.replacements,
            positions,
            objectives: MethodObjectives::default(),
        };
        for pass in passes {
            pass.run(&mut ctx, &mut body)?;
        }
        let code = if body.is_modified() || body.slots.iter().zip(&method.code).any(|(s, op)| s.op != *op) {
            body.lower(&method.name)?
        } else {
            method.code.clone()
        };
        Ok((code, ctx.objectives))
    }

    fn commit(&self, objectives: MethodObjectives, is_sut: bool) {
        for target in &objectives.targets {
            self.recorder.register_target(target);
        }
        for _ in 0..objectives.branch_pairs {
            self.units.mark_new_branch_pair();
        }
        for _ in 0..objectives.success_calls {
            self.units.mark_new_success_call();
        }
        for _ in 0..objectives.numeric_comparisons {
            self.units.mark_new_numeric_comparison();
        }
        for _ in 0..objectives.replaced {
            if is_sut {
                self.units.mark_new_replaced_method_in_sut();
            } else {
                self.units.mark_new_replaced_method_in_third_party();
            }
        }
        for _ in 0..objectives.tracked {
            self.units.mark_new_tracked_method();
        }
        for (branch, parent) in &objectives.dependencies {
            self.units.add_branch_dependency(branch, parent);
        }
    }
}

fn skipped(method: &Method, reason: String) -> SkippedMethod {
    SkippedMethod { name: method.name.clone(), descriptor: method.descriptor.clone(), reason }
}

/// The two objectives of the jump at (`line`, `branch_id`).
fn branch_pair(class_name: &str, line: u32, branch_id: u32) -> [String; 2] {
    [
        naming::branch_objective_name(class_name, line, branch_id, true),
        naming::branch_objective_name(class_name, line, branch_id, false),
    ]
}
