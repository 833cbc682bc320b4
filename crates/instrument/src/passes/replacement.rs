use heurist_bytecode::{InvokeKind, MethodRef, Op, Value};
use heurist_vm::MethodKey;
use tracing::debug;

use super::{Pass, PassContext};
use crate::category::ReplacementType;
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::naming;
use crate::replacement::replacement_key;

/// Redirects calls with an active replacement. The id template is pushed
/// last, right before the call.
pub(super) fn run(ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
    let class_name = ctx.class_name.clone();

    for ip in 0..body.slots.len() {
        let Op::Invoke(idx) = body.slots[ip].op else {
            continue;
        };
        let Some(target) = ctx.class.method_refs.get(idx as usize).cloned() else {
            continue;
        };
        let Some(replacement) = ctx.replacements.get(&MethodKey::of(&target)).cloned() else {
            continue;
        };
        if target.kind.has_receiver() == replacement.is_static() {
            debug!(call = %MethodKey::of(&target), "call site kind does not match the replacement");
            continue;
        }
        let kind = replacement.replacement_type();
        let key = replacement_key(replacement.as_ref())?;

        let line = ctx.lines[ip];
        let template = match line {
            Some(line) if ctx.is_sut && kind != ReplacementType::Tracker => {
                let index = ctx.positions.next(Pass::MethodReplacement, line);
                Some(naming::method_replacement_template(&class_name, line, index))
            }
            _ => None,
        };

        let push = match &template {
            Some(t) => ctx.push_str(t),
            None => ctx.push(Value::Null),
        };
        body.slots[ip].before.push(push);
        let new_ref = ctx.class.add_method_ref(MethodRef::new(
            InvokeKind::Static,
            key.owner,
            key.name,
            key.descriptor,
        ));
        body.slots[ip].op = Op::Invoke(new_ref);

        if let Some(template) = template {
            for result in [true, false] {
                ctx.objectives
                    .targets
                    .push(naming::method_replacement_objective_name(&template, result, kind)?);
            }
        }
        ctx.objectives.replaced += 1;
        if kind == ReplacementType::Tracker {
            ctx.objectives.tracked += 1;
        }
    }
    Ok(())
}
