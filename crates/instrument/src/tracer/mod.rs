//! Per-execution coverage state, written by probes and read by the fitness
//! evaluator.
//!
//! Probes live inside target code and cannot be handed a context, so the
//! tracer is reachable process-wide through [`ExecutionTracer::global`].
//! All updates go through a sharded map and per-objective atomics; only
//! `reset` and `set_action` take the lifecycle lock.

pub mod additional_info;
pub mod taint;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use heurist_bytecode::{JumpKind, Value};
use heurist_distance::{jumps, NumericComparison, Truthness};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::ReplacementType;
use crate::config;
use crate::error::{InstrumentError, TracerError};
use crate::naming;
use crate::recorder::ObjectiveRecorder;

use additional_info::{
    AdditionalInfo, AdditionalInfoSnapshot, ExternalServiceInfo, HostnameResolutionInfo,
    StorageCommand, StringSpecialization, StringSpecializationInfo,
};
use taint::TaintType;

/// One test action (e.g. an HTTP call) within a test execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub index: usize,
    pub name: Option<String>,
    /// Extra values to treat as taint, besides `_EM_<n>_XYZ_` names.
    #[serde(default)]
    pub input_variables: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub mapped_id: Option<u32>,
    pub descriptive_id: String,
    pub value: f64,
    /// Action during which the best value was first reached.
    pub action_index: usize,
}

#[derive(Debug)]
struct ObjectiveCell {
    value: AtomicU64,
    action_index: AtomicUsize,
}

impl ObjectiveCell {
    fn new(value: f64, action_index: usize) -> Self {
        ObjectiveCell {
            value: AtomicU64::new(value.to_bits()),
            action_index: AtomicUsize::new(action_index),
        }
    }

    fn current(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    fn raise(&self, value: f64, action_index: usize) {
        let mut current = self.value.load(Ordering::Acquire);
        while value > f64::from_bits(current) {
            match self.value.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.action_index.store(action_index, Ordering::Release);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Expensive heuristics (regex distance) are skipped after this many per
/// action.
pub const MAX_EXPENSIVE_OPERATIONS: usize = 50;

#[derive(Debug)]
pub struct ExecutionTracer {
    objectives: DashMap<String, ObjectiveCell>,
    action_index: AtomicUsize,
    action_name: RwLock<Option<String>>,
    input_variables: RwLock<BTreeSet<String>>,
    additional_info: RwLock<Vec<Arc<AdditionalInfo>>>,
    kill_switch: AtomicBool,
    expensive_operations: AtomicUsize,
    /// Runs currently inside an action; nested and concurrent runs stack.
    executing_action: AtomicUsize,
    lifecycle: Mutex<()>,
    recorder: Arc<ObjectiveRecorder>,
}

impl ExecutionTracer {
    pub fn new(recorder: Arc<ObjectiveRecorder>) -> Self {
        ExecutionTracer {
            objectives: DashMap::new(),
            action_index: AtomicUsize::new(0),
            action_name: RwLock::new(None),
            input_variables: RwLock::new(BTreeSet::new()),
            additional_info: RwLock::new(vec![Arc::new(AdditionalInfo::new())]),
            kill_switch: AtomicBool::new(false),
            expensive_operations: AtomicUsize::new(0),
            executing_action: AtomicUsize::new(0),
            lifecycle: Mutex::new(()),
            recorder,
        }
    }

    /// The instance all instrumented code reports to by default.
    pub fn global() -> Arc<ExecutionTracer> {
        static GLOBAL: OnceLock<Arc<ExecutionTracer>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ExecutionTracer::new(ObjectiveRecorder::global())))
            .clone()
    }

    pub fn recorder(&self) -> &Arc<ObjectiveRecorder> {
        &self.recorder
    }

    /// Forget everything about the previous test execution. Probes still
    /// running in stale threads may land in the new window.
    pub fn reset(&self) {
        let _guard = self.lifecycle.lock();
        self.objectives.clear();
        self.action_index.store(0, Ordering::Release);
        *self.action_name.write() = None;
        self.input_variables.write().clear();
        *self.additional_info.write() = vec![Arc::new(AdditionalInfo::new())];
        self.kill_switch.store(false, Ordering::Release);
        self.expensive_operations.store(0, Ordering::Release);
        self.executing_action.store(0, Ordering::Release);
        debug!("execution tracer reset");
    }

    pub fn set_action(&self, action: Action) {
        let _guard = self.lifecycle.lock();
        self.kill_switch.store(false, Ordering::Release);
        self.expensive_operations.store(0, Ordering::Release);
        if action.index != self.action_index.load(Ordering::Acquire) {
            self.action_index.store(action.index, Ordering::Release);
            self.additional_info.write().push(Arc::new(AdditionalInfo::new()));
        }
        *self.action_name.write() = action.name;
        if !action.input_variables.is_empty() {
            *self.input_variables.write() = action.input_variables;
        }
    }

    pub fn action_name(&self) -> Option<String> {
        self.action_name.read().clone()
    }

    pub fn action_index(&self) -> usize {
        self.action_index.load(Ordering::Acquire)
    }

    pub fn is_kill_switch(&self) -> bool {
        self.kill_switch.load(Ordering::Acquire)
    }

    /// When on, every probe aborts the execution that triggers it.
    pub fn set_kill_switch(&self, on: bool) {
        self.kill_switch.store(on, Ordering::Release);
    }

    pub fn increase_expensive_operation_count(&self) {
        self.expensive_operations.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_too_many_expensive_operations(&self) -> bool {
        self.expensive_operations.load(Ordering::Acquire) >= MAX_EXPENSIVE_OPERATIONS
    }

    pub fn is_executing_action(&self) -> bool {
        self.executing_action.load(Ordering::Acquire) > 0
    }

    /// Objectives reached outside an action are startup objectives. Each
    /// `true` must be matched by a `false`; the action ends with the last.
    pub fn set_executing_action(&self, executing: bool) {
        if executing {
            self.executing_action.fetch_add(1, Ordering::AcqRel);
        } else {
            let _ = self
                .executing_action
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }

    fn current_info(&self) -> Arc<AdditionalInfo> {
        let list = self.additional_info.read();
        match list.last() {
            Some(info) => info.clone(),
            None => Arc::new(AdditionalInfo::new()),
        }
    }

    // ---- objectives ----

    /// Keep the best value seen for `id` in this execution.
    pub fn update_objective(&self, id: &str, value: f64) -> Result<(), TracerError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(TracerError::InvalidValue { id: id.to_string(), value });
        }
        let action = self.action_index();
        match self.objectives.get(id) {
            Some(cell) => cell.raise(value, action),
            None => {
                self.objectives
                    .entry(id.to_string())
                    .or_insert_with(|| ObjectiveCell::new(value, action))
                    .raise(value, action);
            }
        }
        self.recorder.update(id, value, !self.is_executing_action());
        Ok(())
    }

    pub fn executed_line(
        &self,
        class_name: &str,
        method: &str,
        descriptor: &str,
        line: u32,
    ) -> Result<(), TracerError> {
        self.update_objective(&naming::line_objective_id(class_name, line), 1.0)?;
        self.update_objective(&naming::class_objective_id(class_name), 1.0)?;
        let (statement, method_id) = naming::statement_ids(class_name, method, descriptor, line);
        self.current_info().push_last_executed_statement(statement, method_id);
        Ok(())
    }

    pub fn completed_last_executed_statement(&self) {
        self.current_info().pop_last_executed_statement();
    }

    pub fn last_executed_statement(&self) -> Option<String> {
        self.current_info().last_executed_statement()
    }

    /// The call at (`line`, `index`) started, or returned normally.
    pub fn executing_method(
        &self,
        class_name: &str,
        line: u32,
        index: u32,
        completed: bool,
    ) -> Result<(), TracerError> {
        let id = naming::success_call_objective_name(class_name, line, index);
        self.update_objective(&id, if completed { 1.0 } else { 0.5 })
    }

    /// `t` grades the jump being taken, which is the `else` side of the
    /// source condition.
    pub fn update_branch(
        &self,
        class_name: &str,
        line: u32,
        branch_id: u32,
        t: &Truthness,
    ) -> Result<(), TracerError> {
        let for_then = naming::branch_objective_id(class_name, line, branch_id, true);
        let for_else = naming::branch_objective_id(class_name, line, branch_id, false);
        self.update_objective(&for_else, t.of_true())?;
        self.update_objective(&for_then, t.of_false())
    }

    /// Score a conditional jump from the operands it is about to consume.
    pub fn executing_branch_jump(
        &self,
        kind: JumpKind,
        operands: &[Value],
        class_name: &str,
        line: u32,
        branch_id: u32,
    ) -> Result<(), InstrumentError> {
        let cfg = config::heuristics();
        let int = |i: usize| operands.get(i).and_then(Value::as_int).unwrap_or(0);
        let null = Value::Null;
        let obj = |i: usize| operands.get(i).unwrap_or(&null);
        let t = if kind.is_single_int() {
            jumps::for_single_value_jump(&cfg, int(0), kind)?
        } else if kind.is_int_comparison() {
            jumps::for_value_comparison(&cfg, int(0), int(1), kind)?
        } else if kind.is_object_comparison() {
            jumps::for_object_comparison(&cfg, obj(0), obj(1), kind)?
        } else {
            jumps::for_null_comparison(&cfg, obj(0), kind)?
        };
        self.update_branch(class_name, line, branch_id, &t)?;
        Ok(())
    }

    pub fn executed_numeric_comparison(
        &self,
        id_template: &str,
        cmp: &NumericComparison,
    ) -> Result<(), TracerError> {
        for (res, t) in [(-1, &cmp.less), (0, &cmp.equal), (1, &cmp.greater)] {
            let id = naming::numeric_comparison_objective_name(id_template, res);
            self.update_objective(&id, t.of_true())?;
        }
        Ok(())
    }

    pub fn executed_replaced_method(
        &self,
        id_template: &str,
        kind: ReplacementType,
        t: &Truthness,
    ) -> Result<(), TracerError> {
        let id_true = naming::method_replacement_objective_name(id_template, true, kind)?;
        let id_false = naming::method_replacement_objective_name(id_template, false, kind)?;
        self.update_objective(&id_true, t.of_true())?;
        self.update_objective(&id_false, t.of_false())
    }

    // ---- queries ----

    pub fn number_of_objectives(&self) -> usize {
        self.objectives.len()
    }

    pub fn number_of_objectives_with_prefix(&self, prefix: &str) -> usize {
        self.objectives.iter().filter(|e| e.key().starts_with(prefix)).count()
    }

    pub fn number_of_non_covered_objectives(&self, prefix: &str) -> usize {
        self.non_covered_objectives(prefix).len()
    }

    /// Objectives seen in this execution, under `prefix`, below 1.
    pub fn non_covered_objectives(&self, prefix: &str) -> BTreeSet<String> {
        self.objectives
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().current() < 1.0)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn value(&self, id: &str) -> Result<f64, TracerError> {
        self.objectives
            .get(id)
            .map(|cell| cell.current())
            .ok_or_else(|| TracerError::UnknownObjective(id.to_string()))
    }

    pub fn objective_coverage(&self) -> BTreeMap<String, TargetInfo> {
        self.objectives
            .iter()
            .map(|e| {
                let id = e.key().clone();
                let info = TargetInfo {
                    mapped_id: Some(self.recorder.mapped_id(&id)),
                    descriptive_id: id.clone(),
                    value: e.value().current(),
                    action_index: e.value().action_index.load(Ordering::Acquire),
                };
                (id, info)
            })
            .collect()
    }

    /// One snapshot per action, in action order.
    pub fn expose_additional_info_list(&self) -> Vec<AdditionalInfoSnapshot> {
        self.additional_info.read().iter().map(|info| info.snapshot()).collect()
    }

    // ---- additional info ----

    pub fn add_query_parameter(&self, param: &str) {
        self.current_info().add_query_parameter(param);
    }

    pub fn add_header(&self, header: &str) {
        self.current_info().add_header(header);
    }

    pub fn add_parsed_dto_name(&self, name: &str) {
        self.current_info().add_parsed_dto_name(name);
    }

    pub fn add_string_specialization(
        &self,
        taint_input: &str,
        info: StringSpecializationInfo,
    ) -> Result<(), TracerError> {
        if !self.is_taint_input(taint_input) {
            return Err(TracerError::NotTainted(taint_input.to_string()));
        }
        self.current_info().add_specialization(taint_input, info);
        Ok(())
    }

    pub fn add_hostname_info(&self, info: HostnameResolutionInfo) {
        self.current_info().add_hostname_info(info);
    }

    pub fn add_external_service(&self, info: ExternalServiceInfo) {
        if !self.is_executing_action() {
            self.recorder.register_external_service_at_startup(info.clone());
        }
        self.current_info().add_external_service(info);
    }

    pub fn add_storage_command(&self, command: StorageCommand) {
        self.current_info().add_storage_command(command);
    }

    // ---- taint ----

    pub fn is_taint_input(&self, input: &str) -> bool {
        taint::is_taint_input(input) || self.input_variables.read().contains(input)
    }

    pub fn taint_type(&self, input: Option<&str>) -> TaintType {
        let Some(input) = input else {
            return TaintType::None;
        };
        if self.is_taint_input(input) {
            return TaintType::FullMatch;
        }
        if taint::includes_taint_input(input)
            || self.input_variables.read().iter().any(|v| input.contains(v.as_str()))
        {
            return TaintType::PartialMatch;
        }
        TaintType::None
    }

    /// Record what a tainted value was compared against.
    pub fn handle_taint_for_string_equals(&self, left: Option<&str>, right: Option<&str>, ignore_case: bool) {
        let (Some(left), Some(right)) = (left, right) else {
            return;
        };
        let tainted_left = self.is_taint_input(left);
        let tainted_right = self.is_taint_input(right);

        if tainted_left && tainted_right {
            let same = if ignore_case { left.eq_ignore_ascii_case(right) } else { left == right };
            // only plain taint names are bound to each other
            if same || !taint::is_taint_input(left) || !taint::is_taint_input(right) {
                return;
            }
            let id = format!("{left}___{right}");
            let info = self.current_info();
            info.add_specialization(left, StringSpecializationInfo::new(StringSpecialization::Equal, id.clone()));
            info.add_specialization(right, StringSpecializationInfo::new(StringSpecialization::Equal, id));
            return;
        }

        let kind = if ignore_case {
            StringSpecialization::ConstantIgnoreCase
        } else {
            StringSpecialization::Constant
        };
        if tainted_left {
            self.current_info().add_specialization(left, StringSpecializationInfo::new(kind, right));
        } else if tainted_right {
            self.current_info().add_specialization(right, StringSpecializationInfo::new(kind, left));
        }
    }

    pub fn handle_extra_param_taint(&self, left: Option<&str>, right: Option<&str>) {
        if let Some(name) = extra_taint_partner(left, right, taint::EXTRA_PARAM_TAINT) {
            self.add_query_parameter(name);
        }
    }

    pub fn handle_extra_header_taint(&self, left: Option<&str>, right: Option<&str>) {
        if let Some(name) = extra_taint_partner(left, right, taint::EXTRA_HEADER_TAINT) {
            self.add_header(name);
        }
    }
}

/// The side compared against `marker`, if exactly one side is it.
fn extra_taint_partner<'a>(left: Option<&'a str>, right: Option<&'a str>, marker: &str) -> Option<&'a str> {
    let (left, right) = (left.filter(|s| !s.is_empty())?, right.filter(|s| !s.is_empty())?);
    match (left == marker, right == marker) {
        (true, false) => Some(right),
        (false, true) => Some(left),
        _ => None,
    }
}
