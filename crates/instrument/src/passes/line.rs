use heurist_bytecode::Op;

use super::PassContext;
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::naming;
use crate::probes::{
    COMPLETED_LAST_EXECUTED_STATEMENT, COMPLETED_LAST_EXECUTED_STATEMENT_DESC, EXECUTED_LINE,
    EXECUTED_LINE_DESC,
};

/// `executedLine` after every line marker, and the statement stack pop
/// before every return.
pub(super) fn run(ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
    if ctx.method.is_synthetic() {
        return Ok(());
    }
    let class_name = ctx.class_name.clone();
    let method_name = ctx.method.name.clone();
    let descriptor = ctx.method.descriptor.clone();

    let mut has_lines = false;
    for slot in body.slots.iter_mut() {
        let Op::Line(n) = slot.op else {
            continue;
        };
        has_lines = true;
        slot.after.extend([
            ctx.push_str(&class_name),
            ctx.push_str(&method_name),
            ctx.push_str(&descriptor),
            ctx.push_int(i64::from(n)),
            ctx.probe(EXECUTED_LINE, EXECUTED_LINE_DESC),
        ]);
        if ctx.objectives.lines.insert(n) {
            ctx.objectives.targets.push(naming::line_objective_name(&class_name, n));
        }
    }
    if !has_lines {
        return Ok(());
    }
    ctx.objectives.targets.push(naming::class_objective_name(&class_name));

    for slot in body.slots.iter_mut().filter(|s| s.op == Op::Ret) {
        slot.before.push(ctx.probe(
            COMPLETED_LAST_EXECUTED_STATEMENT,
            COMPLETED_LAST_EXECUTED_STATEMENT_DESC,
        ));
    }
    Ok(())
}
