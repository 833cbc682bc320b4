//! Slot representation of a method body that passes rewrite.
//!
//! Every original instruction owns a slot with code inserted before and
//! after it. Passes only append to those lists or swap the slot's own
//! instruction for one with the same control flow. Lowering flattens the
//! slots and points every jump at the start of its target slot, so code
//! inserted before a jump target runs on every path into it.

use heurist_bytecode::Op;

use crate::error::InstrumentError;

/// Largest instrumented method body accepted, as on the JVM.
pub const MAX_CODE_LENGTH: usize = 65_535;

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub before: Vec<Op>,
    pub op: Op,
    pub after: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    pub slots: Vec<Slot>,
}

impl MethodBody {
    pub fn lift(code: &[Op]) -> Self {
        MethodBody {
            slots: code
                .iter()
                .map(|op| Slot { before: Vec::new(), op: op.clone(), after: Vec::new() })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.slots.iter().any(|s| !s.before.is_empty() || !s.after.is_empty())
    }

    pub fn lower(&self, method: &str) -> Result<Vec<Op>, InstrumentError> {
        let unsupported = |msg: String| InstrumentError::UnsupportedShape {
            method: method.to_string(),
            msg,
        };

        let mut starts = Vec::with_capacity(self.slots.len());
        let mut len = 0usize;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.before.iter().chain(&slot.after).any(|op| op.jump_target().is_some()) {
                return Err(unsupported(format!("inserted code at {i} contains a jump")));
            }
            if !slot.after.is_empty() && slot.op.ends_flow() {
                return Err(unsupported(format!("code inserted after {} at {i}", slot.op.mnemonic())));
            }
            starts.push(len);
            len += slot.before.len() + 1 + slot.after.len();
        }
        if len > MAX_CODE_LENGTH {
            return Err(InstrumentError::CodeTooLong { method: method.to_string(), len });
        }

        let mut code = Vec::with_capacity(len);
        for slot in &self.slots {
            code.extend(slot.before.iter().cloned());
            code.push(match &slot.op {
                Op::Jump(kind, target) => {
                    let start = starts
                        .get(*target as usize)
                        .ok_or_else(|| unsupported(format!("jump target {target} out of range")))?;
                    Op::Jump(*kind, *start as u32)
                }
                other => other.clone(),
            });
            code.extend(slot.after.iter().cloned());
        }
        Ok(code)
    }
}
