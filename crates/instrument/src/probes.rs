//! Natives behind the calls that instrumentation inserts into target code.
//!
//! A probe never lets a failure escape into the target: errors are logged
//! and the probe returns normally. The only exception is the kill switch,
//! which aborts the execution.

use std::sync::Arc;

use heurist_bytecode::{CmpKind, JumpKind, Value};
use heurist_distance::comparisons;
use heurist_vm::{NativeError, NativeRegistry, NativeResult};
use tracing::warn;

use crate::config;
use crate::tracer::ExecutionTracer;

/// Owner of every probe method.
pub const PROBE_OWNER: &str = "org/heurist/instrumentation/ExecutionTracer";

pub const EXECUTED_LINE: &str = "executedLine";
pub const EXECUTED_LINE_DESC: &str = "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;I)V";
pub const COMPLETED_LAST_EXECUTED_STATEMENT: &str = "completedLastExecutedStatement";
pub const COMPLETED_LAST_EXECUTED_STATEMENT_DESC: &str = "()V";
pub const EXECUTING_METHOD: &str = "executingMethod";
pub const EXECUTING_METHOD_DESC: &str = "(Ljava/lang/String;IIZ)V";

pub const EXECUTING_BRANCH_JUMP: &str = "executingBranchJump";
pub const JUMP_DESC_1_VALUE: &str = "(IILjava/lang/String;II)V";
pub const JUMP_DESC_2_VALUES: &str = "(IIILjava/lang/String;II)V";
pub const JUMP_DESC_OBJECTS: &str = "(Ljava/lang/Object;Ljava/lang/Object;ILjava/lang/String;II)V";
pub const JUMP_DESC_NULL: &str = "(Ljava/lang/Object;ILjava/lang/String;II)V";

pub const EXECUTING_NUMERIC_COMPARISON: &str = "executingNumericComparison";
pub const NUMERIC_COMPARISON_DESC_LONG: &str = "(JJILjava/lang/String;)V";
pub const NUMERIC_COMPARISON_DESC_DOUBLE: &str = "(DDILjava/lang/String;)V";

/// The `executingBranchJump` overload for a jump kind.
pub fn branch_jump_descriptor(kind: JumpKind) -> &'static str {
    if kind.is_single_int() {
        JUMP_DESC_1_VALUE
    } else if kind.is_int_comparison() {
        JUMP_DESC_2_VALUES
    } else if kind.is_object_comparison() {
        JUMP_DESC_OBJECTS
    } else {
        JUMP_DESC_NULL
    }
}

pub fn numeric_comparison_descriptor(kind: CmpKind) -> &'static str {
    if kind.is_integral() {
        NUMERIC_COMPARISON_DESC_LONG
    } else {
        NUMERIC_COMPARISON_DESC_DOUBLE
    }
}

fn str_arg(args: &[Value], i: usize) -> &str {
    args.get(i).and_then(Value::as_str).unwrap_or_default()
}

fn int_arg(args: &[Value], i: usize) -> i64 {
    args.get(i).and_then(Value::as_int).unwrap_or_default()
}

fn u32_arg(args: &[Value], i: usize) -> u32 {
    u32::try_from(int_arg(args, i)).unwrap_or_default()
}

/// Wraps a probe body with the kill switch check and error swallowing.
fn probe<E: std::fmt::Display>(
    tracer: &Arc<ExecutionTracer>,
    name: &'static str,
    body: impl Fn(&ExecutionTracer, &[Value]) -> Result<(), E> + Send + Sync + 'static,
) -> impl Fn(&[Value]) -> NativeResult + Send + Sync + 'static {
    let tracer = tracer.clone();
    move |args| {
        if tracer.is_kill_switch() {
            return Err(NativeError::Abort(format!("kill switch is on ({name})")));
        }
        if let Err(e) = body(&tracer, args) {
            warn!(probe = name, error = %e, "probe failed");
        }
        Ok(None)
    }
}

/// Register every probe method, reporting to `tracer`.
pub fn install(registry: &mut NativeRegistry, tracer: Arc<ExecutionTracer>) {
    registry.register(
        PROBE_OWNER,
        EXECUTED_LINE,
        EXECUTED_LINE_DESC,
        probe(&tracer, EXECUTED_LINE, |t, args| {
            t.executed_line(str_arg(args, 0), str_arg(args, 1), str_arg(args, 2), u32_arg(args, 3))
        }),
    );
    registry.register(
        PROBE_OWNER,
        COMPLETED_LAST_EXECUTED_STATEMENT,
        COMPLETED_LAST_EXECUTED_STATEMENT_DESC,
        probe(&tracer, COMPLETED_LAST_EXECUTED_STATEMENT, |t, _| {
            t.completed_last_executed_statement();
            Ok::<(), std::convert::Infallible>(())
        }),
    );
    registry.register(
        PROBE_OWNER,
        EXECUTING_METHOD,
        EXECUTING_METHOD_DESC,
        probe(&tracer, EXECUTING_METHOD, |t, args| {
            let completed = int_arg(args, 3) != 0;
            t.executing_method(str_arg(args, 0), u32_arg(args, 1), u32_arg(args, 2), completed)
        }),
    );

    // operands, then opcode, class, line and branch id
    for (desc, operands) in [
        (JUMP_DESC_1_VALUE, 1usize),
        (JUMP_DESC_2_VALUES, 2),
        (JUMP_DESC_OBJECTS, 2),
        (JUMP_DESC_NULL, 1),
    ] {
        registry.register(
            PROBE_OWNER,
            EXECUTING_BRANCH_JUMP,
            desc,
            probe(&tracer, EXECUTING_BRANCH_JUMP, move |t, args| {
                let opcode = int_arg(args, operands);
                let kind = JumpKind::from_opcode(opcode)
                    .ok_or_else(|| format!("unknown jump opcode {opcode}"))?;
                let values = args.get(..operands).unwrap_or_default();
                t.executing_branch_jump(
                    kind,
                    values,
                    str_arg(args, operands + 1),
                    u32_arg(args, operands + 2),
                    u32_arg(args, operands + 3),
                )
                .map_err(|e| e.to_string())
            }),
        );
    }

    for desc in [NUMERIC_COMPARISON_DESC_LONG, NUMERIC_COMPARISON_DESC_DOUBLE] {
        registry.register(
            PROBE_OWNER,
            EXECUTING_NUMERIC_COMPARISON,
            desc,
            probe(&tracer, EXECUTING_NUMERIC_COMPARISON, |t, args| {
                let opcode = int_arg(args, 2);
                let kind = CmpKind::from_opcode(opcode)
                    .ok_or_else(|| format!("unknown comparison opcode {opcode}"))?;
                let cfg = config::heuristics();
                let cmp = if kind.is_integral() {
                    comparisons::compare_i64(&cfg, int_arg(args, 0), int_arg(args, 1))
                } else {
                    let f = |i: usize| args.get(i).and_then(Value::as_float).unwrap_or_default();
                    comparisons::compare_f64(&cfg, f(0), f(1), kind)
                }
                .map_err(|e| e.to_string())?;
                t.executed_numeric_comparison(str_arg(args, 3), &cmp)
                    .map_err(|e| e.to_string())
            }),
        );
    }
}
