use std::collections::BTreeMap;

use heurist_bytecode::{verify, Op};

use super::{branch_pair, Pass, PassContext};
use crate::error::InstrumentError;
use crate::ir::MethodBody;
use crate::probes::{branch_jump_descriptor, EXECUTING_BRANCH_JUMP};

/// Reports the operands of every conditional jump worth a pair of
/// objectives.
pub(super) fn run(ctx: &mut PassContext<'_>, body: &mut MethodBody) -> Result<(), InstrumentError> {
    let code = ctx.original_code().to_vec();
    let reachable = ctx.cfg.reachable();
    let targets: Vec<bool> = {
        let mut t = vec![false; code.len()];
        for op in &code {
            if let Some(target) = op.jump_target() {
                if let Some(flag) = t.get_mut(target as usize) {
                    *flag = true;
                }
            }
        }
        t
    };

    // ip of each instrumented jump to its (line, branch id)
    let mut instrumented: BTreeMap<usize, (u32, u32)> = BTreeMap::new();
    for (ip, op) in code.iter().enumerate() {
        let Op::Jump(kind, _) = op else {
            continue;
        };
        if !kind.is_conditional() {
            continue;
        }
        let Some(line) = ctx.lines[ip] else {
            continue;
        };
        let block_reachable = ctx.cfg.block_of(ip).is_some_and(|b| reachable[b]);
        if !block_reachable || verify::is_degenerate_jump(&code, ip) || constant_operands(&code, &targets, ip, kind.operand_count()) {
            continue;
        }
        let id = ctx.positions.next(Pass::Branch, line);
        instrumented.insert(ip, (line, id));
    }

    let class_name = ctx.class_name.clone();
    for (&ip, &(line, branch_id)) in &instrumented {
        let Op::Jump(kind, _) = code[ip] else {
            continue;
        };
        let dup = if kind.operand_count() == 2 { Op::Dup2 } else { Op::Dup };
        let ops = [
            dup,
            ctx.push_int(i64::from(kind.opcode())),
            ctx.push_str(&class_name),
            ctx.push_int(i64::from(line)),
            ctx.push_int(i64::from(branch_id)),
            ctx.probe(EXECUTING_BRANCH_JUMP, branch_jump_descriptor(kind)),
        ];
        body.slots[ip].before.extend(ops);
        ctx.objectives.targets.extend(branch_pair(&class_name, line, branch_id));
        ctx.objectives.branch_pairs += 1;
    }

    record_dependencies(ctx, &code, &instrumented);
    Ok(())
}

/// Whether every operand of the jump at `ip` is a constant pushed right
/// before it, with no other path into those pushes.
fn constant_operands(code: &[Op], targets: &[bool], ip: usize, operands: usize) -> bool {
    if operands == 0 || ip < operands {
        return false;
    }
    let start = ip - operands;
    code[start..ip].iter().all(|op| matches!(op, Op::PushConst(_)))
        && (start + 1..=ip).all(|i| !targets[i])
}

/// A jump is control dependent on the side of a parent jump that decides
/// whether it runs. Taking a jump is its `_falseBranch`.
fn record_dependencies(ctx: &mut PassContext<'_>, code: &[Op], instrumented: &BTreeMap<usize, (u32, u32)>) {
    let deps = ctx.cfg.control_dependences();
    let class_name = ctx.class_name.clone();
    for (&ip, &(line, branch_id)) in instrumented {
        let Some(block) = ctx.cfg.block_of(ip) else {
            continue;
        };
        let children = branch_pair(&class_name, line, branch_id);
        for &(parent_block, succ) in &deps[block] {
            let parent_ip = ctx.cfg.blocks()[parent_block].end - 1;
            let Some(&(parent_line, parent_id)) = instrumented.get(&parent_ip) else {
                continue;
            };
            let Some(target) = code[parent_ip].jump_target() else {
                continue;
            };
            let taken = ctx.cfg.block_of(target as usize) == Some(succ);
            let [parent_then, parent_else] = branch_pair(&class_name, parent_line, parent_id);
            let parent = if taken { parent_else } else { parent_then };
            for child in &children {
                ctx.objectives.dependencies.push((child.clone(), parent.clone()));
            }
        }
    }
}
