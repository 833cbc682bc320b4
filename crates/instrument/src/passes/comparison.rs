use heurist_bytecode::Op;

use super::{Pass, PassContext};
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::naming;
use crate::probes::{numeric_comparison_descriptor, EXECUTING_NUMERIC_COMPARISON};

/// `lcmp`, `fcmp<op>` and `dcmp<op>` report all three outcomes.
pub(super) fn run(ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
    let class_name = ctx.class_name.clone();
    let reachable = ctx.cfg.reachable();

    for ip in 0..body.slots.len() {
        let Op::Cmp(kind) = body.slots[ip].op else {
            continue;
        };
        let Some(line) = ctx.lines[ip] else {
            continue;
        };
        if !ctx.cfg.block_of(ip).is_some_and(|b| reachable[b]) {
            continue;
        }
        let index = ctx.positions.next(Pass::NumericComparison, line);

        let template = naming::numeric_comparison_template(&class_name, line, index);
        let ops = [
            Op::Dup2,
            ctx.push_int(i64::from(kind.opcode())),
            ctx.push_str(&template),
            ctx.probe(EXECUTING_NUMERIC_COMPARISON, numeric_comparison_descriptor(kind)),
        ];
        body.slots[ip].before.extend(ops);
        for res in [-1, 0, 1] {
            ctx.objectives
                .targets
                .push(naming::numeric_comparison_objective_name(&template, res));
        }
        ctx.objectives.numeric_comparisons += 1;
    }
    Ok(())
}
