use heurist_bytecode::{Op, Value};

use super::{Pass, PassContext};
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::naming;
use crate::probes::{EXECUTING_METHOD, EXECUTING_METHOD_DESC, PROBE_OWNER};
use crate::replacement::REPLACEMENT_OWNER;

/// Brackets every call on a known line with `executingMethod` probes, so a
/// call that throws stays at 0.5.
pub(super) fn run(ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
    let class_name = ctx.class_name.clone();

    for (ip, slot) in body.slots.iter_mut().enumerate() {
        let Op::Invoke(idx) = slot.op else {
            continue;
        };
        let Some(line) = ctx.lines[ip] else {
            continue;
        };
        let is_probe = ctx
            .class
            .method_refs
            .get(idx as usize)
            .is_some_and(|r| r.owner == PROBE_OWNER || r.owner == REPLACEMENT_OWNER);
        if is_probe {
            continue;
        }
        let call_index = ctx.positions.next(Pass::SuccessCall, line);

        for (list, completed) in [(&mut slot.before, false), (&mut slot.after, true)] {
            list.extend([
                ctx.push_str(&class_name),
                ctx.push_int(i64::from(line)),
                ctx.push_int(i64::from(call_index)),
                ctx.push(Value::Bool(completed)),
                ctx.probe(EXECUTING_METHOD, EXECUTING_METHOD_DESC),
            ]);
        }
        ctx.objectives
            .targets
            .push(naming::success_call_objective_name(&class_name, line, call_index));
        ctx.objectives.success_calls += 1;
    }
    Ok(())
}
