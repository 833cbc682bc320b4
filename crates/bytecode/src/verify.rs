//! Structural verification of method bodies.
//!
//! Checks pool and local indices, jump targets, that control never falls
//! off the end of the code, and that the operand stack height is the same
//! on every path into an instruction and never goes negative.

use crate::class_file::{BytecodeError, ClassFile, Method};
use crate::descriptor::MethodDescriptor;
use crate::opcode::{JumpKind, Op};
use crate::value::Value;

pub fn verify_class(class: &ClassFile) -> Result<(), BytecodeError> {
    for method in &class.methods {
        verify_method(class, method)?;
    }
    Ok(())
}

pub fn verify_method(class: &ClassFile, method: &Method) -> Result<(), BytecodeError> {
    let fail = |index: usize, msg: String| BytecodeError::Verify {
        method: format!("{}{}", method.name, method.descriptor),
        index,
        msg,
    };

    let desc = method.parsed_descriptor()?;
    let receiver = usize::from(!method.is_static);
    if desc.arg_count() + receiver > method.locals as usize {
        return Err(fail(0, "fewer locals than parameters".into()));
    }
    let code = &method.code;
    if code.is_empty() {
        return Err(fail(0, "empty code".into()));
    }

    let mut heights: Vec<Option<usize>> = vec![None; code.len()];
    let mut work = vec![(0usize, 0usize)];

    while let Some((ip, height)) = work.pop() {
        match heights[ip] {
            Some(h) if h == height => continue,
            Some(h) => {
                return Err(fail(ip, format!("stack height mismatch: {h} vs {height}")));
            }
            None => heights[ip] = Some(height),
        }

        let op = &code[ip];
        let (pops, pushes) = stack_effect(class, &desc, op).map_err(|msg| fail(ip, msg))?;
        if height < pops {
            return Err(fail(ip, format!("stack underflow on {}", op.mnemonic())));
        }
        let next_height = height - pops + pushes;

        check_operands(class, method, op).map_err(|msg| fail(ip, msg))?;

        if let Some(target) = op.jump_target() {
            if target as usize >= code.len() {
                return Err(fail(ip, format!("jump target {target} out of range")));
            }
            work.push((target as usize, next_height));
        }
        if !op.ends_flow() {
            if ip + 1 >= code.len() {
                return Err(fail(ip, "control falls off the end of the code".into()));
            }
            work.push((ip + 1, next_height));
        }
    }
    Ok(())
}

fn check_operands(class: &ClassFile, method: &Method, op: &Op) -> Result<(), String> {
    match op {
        Op::PushConst(idx) if *idx as usize >= class.constants.len() => {
            Err(format!("constant index {idx} out of range"))
        }
        Op::Throw(idx) => match class.constants.get(*idx as usize) {
            Some(Value::String(_)) => Ok(()),
            _ => Err(format!("throw needs a string constant, got index {idx}")),
        },
        Op::LoadLocal(idx) | Op::StoreLocal(idx) if *idx >= u32::from(method.locals) => {
            Err(format!("local index {idx} out of range"))
        }
        _ => Ok(()),
    }
}

fn stack_effect(
    class: &ClassFile,
    desc: &MethodDescriptor,
    op: &Op,
) -> Result<(usize, usize), String> {
    let effect = match op {
        Op::PushConst(_) | Op::LoadLocal(_) => (0, 1),
        Op::StoreLocal(_) | Op::Pop => (1, 0),
        Op::Line(_) | Op::Nop => (0, 0),
        Op::Jump(kind, _) => (kind.operand_count(), 0),
        Op::Cmp(_) => (2, 1),
        Op::Invoke(idx) => {
            let r = class
                .method_refs
                .get(*idx as usize)
                .ok_or_else(|| format!("method ref {idx} out of range"))?;
            let callee = MethodDescriptor::parse(&r.descriptor).map_err(|e| e.to_string())?;
            let pops = callee.arg_count() + usize::from(r.kind.has_receiver());
            (pops, usize::from(callee.returns_value()))
        }
        Op::Ret => (usize::from(desc.returns_value()), 0),
        Op::Throw(_) => (1, 0),
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem | Op::Concat => (2, 1),
        Op::Neg | Op::IntToFloat | Op::FloatToInt | Op::ListLen => (1, 1),
        Op::Dup => (1, 2),
        Op::Dup2 => (2, 4),
        Op::Swap => (2, 2),
        Op::MakeList(n) => (*n as usize, 1),
        Op::ListGet => (2, 1),
    };
    Ok(effect)
}

/// Jumps that cannot be taken differently from falling through.
pub fn is_degenerate_jump(code: &[Op], ip: usize) -> bool {
    match code.get(ip) {
        Some(Op::Jump(kind, target)) => kind != &JumpKind::Goto && *target as usize == ip + 1,
        _ => false,
    }
}
