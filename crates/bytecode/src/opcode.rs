use serde::{Deserialize, Serialize};
use std::fmt;

/// Instructions of the class-file IR.
/// Stack-based: operands are pushed/popped from the operand stack. Jump
/// targets are instruction indices inside the same method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Push a constant from the constant pool onto the stack.
    PushConst(u32),

    /// Load a local variable onto the stack.
    LoadLocal(u32),

    /// Pop the top of stack into a local variable.
    StoreLocal(u32),

    /// Source line marker. Executes as a no-op.
    Line(u32),

    /// Conditional or unconditional jump.
    Jump(JumpKind, u32),

    /// Pop two numbers, push -1, 0 or 1.
    Cmp(CmpKind),

    /// Call the method reference at the given index of the class's ref table.
    /// Pops as many arguments as the descriptor declares (plus the receiver
    /// for non-static calls) and pushes the result unless it is void.
    Invoke(u32),

    /// Return from the current method. Pops the return value unless the
    /// method descriptor is void.
    Ret,

    /// Pop a message and throw an exception whose class name is the given
    /// string constant.
    Throw(u32),

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,

    /// Pop two values, push their string concatenation.
    Concat,

    // Conversions
    IntToFloat,
    FloatToInt,

    // Stack
    Pop,
    Dup,
    /// Duplicate the top two stack entries (`a b` becomes `a b a b`).
    Dup2,
    Swap,

    /// Pop N values, push a list.
    MakeList(u8),
    /// Pop list, push its length.
    ListLen,
    /// Pop index and list, push element.
    ListGet,

    Nop,
}

impl Op {
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Op::Jump(_, target) => Some(*target),
            _ => None,
        }
    }

    pub fn is_conditional_jump(&self) -> bool {
        matches!(self, Op::Jump(kind, _) if kind.is_conditional())
    }

    /// True when control never falls through to the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(self, Op::Ret | Op::Throw(_) | Op::Jump(JumpKind::Goto, _))
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::PushConst(_) => "push",
            Op::LoadLocal(_) => "load",
            Op::StoreLocal(_) => "store",
            Op::Line(_) => ".line",
            Op::Jump(kind, _) => kind.mnemonic(),
            Op::Cmp(kind) => kind.mnemonic(),
            Op::Invoke(_) => "invoke",
            Op::Ret => "ret",
            Op::Throw(_) => "throw",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Rem => "rem",
            Op::Neg => "neg",
            Op::Concat => "concat",
            Op::IntToFloat => "i2d",
            Op::FloatToInt => "d2i",
            Op::Pop => "pop",
            Op::Dup => "dup",
            Op::Dup2 => "dup2",
            Op::Swap => "swap",
            Op::MakeList(_) => "newlist",
            Op::ListLen => "listlen",
            Op::ListGet => "listget",
            Op::Nop => "nop",
        }
    }
}

/// The JVM jump instructions, numbered with their real opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpKind {
    Ifeq,
    Ifne,
    Iflt,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpeq,
    IfIcmpne,
    IfIcmplt,
    IfIcmpge,
    IfIcmpgt,
    IfIcmple,
    IfAcmpeq,
    IfAcmpne,
    Goto,
    Ifnull,
    Ifnonnull,
}

impl JumpKind {
    pub const ALL: [JumpKind; 17] = [
        JumpKind::Ifeq,
        JumpKind::Ifne,
        JumpKind::Iflt,
        JumpKind::Ifge,
        JumpKind::Ifgt,
        JumpKind::Ifle,
        JumpKind::IfIcmpeq,
        JumpKind::IfIcmpne,
        JumpKind::IfIcmplt,
        JumpKind::IfIcmpge,
        JumpKind::IfIcmpgt,
        JumpKind::IfIcmple,
        JumpKind::IfAcmpeq,
        JumpKind::IfAcmpne,
        JumpKind::Goto,
        JumpKind::Ifnull,
        JumpKind::Ifnonnull,
    ];

    pub fn opcode(&self) -> u8 {
        match self {
            JumpKind::Ifeq => 153,
            JumpKind::Ifne => 154,
            JumpKind::Iflt => 155,
            JumpKind::Ifge => 156,
            JumpKind::Ifgt => 157,
            JumpKind::Ifle => 158,
            JumpKind::IfIcmpeq => 159,
            JumpKind::IfIcmpne => 160,
            JumpKind::IfIcmplt => 161,
            JumpKind::IfIcmpge => 162,
            JumpKind::IfIcmpgt => 163,
            JumpKind::IfIcmple => 164,
            JumpKind::IfAcmpeq => 165,
            JumpKind::IfAcmpne => 166,
            JumpKind::Goto => 167,
            JumpKind::Ifnull => 198,
            JumpKind::Ifnonnull => 199,
        }
    }

    pub fn from_opcode(code: i64) -> Option<Self> {
        JumpKind::ALL.into_iter().find(|k| k.opcode() as i64 == code)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            JumpKind::Ifeq => "ifeq",
            JumpKind::Ifne => "ifne",
            JumpKind::Iflt => "iflt",
            JumpKind::Ifge => "ifge",
            JumpKind::Ifgt => "ifgt",
            JumpKind::Ifle => "ifle",
            JumpKind::IfIcmpeq => "if_icmpeq",
            JumpKind::IfIcmpne => "if_icmpne",
            JumpKind::IfIcmplt => "if_icmplt",
            JumpKind::IfIcmpge => "if_icmpge",
            JumpKind::IfIcmpgt => "if_icmpgt",
            JumpKind::IfIcmple => "if_icmple",
            JumpKind::IfAcmpeq => "if_acmpeq",
            JumpKind::IfAcmpne => "if_acmpne",
            JumpKind::Goto => "goto",
            JumpKind::Ifnull => "ifnull",
            JumpKind::Ifnonnull => "ifnonnull",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        JumpKind::ALL.into_iter().find(|k| k.mnemonic() == name)
    }

    pub fn is_conditional(&self) -> bool {
        *self != JumpKind::Goto
    }

    /// Number of stack operands the jump consumes.
    pub fn operand_count(&self) -> usize {
        match self {
            JumpKind::Goto => 0,
            JumpKind::Ifeq
            | JumpKind::Ifne
            | JumpKind::Iflt
            | JumpKind::Ifge
            | JumpKind::Ifgt
            | JumpKind::Ifle
            | JumpKind::Ifnull
            | JumpKind::Ifnonnull => 1,
            _ => 2,
        }
    }

    pub fn is_single_int(&self) -> bool {
        matches!(
            self,
            JumpKind::Ifeq
                | JumpKind::Ifne
                | JumpKind::Iflt
                | JumpKind::Ifge
                | JumpKind::Ifgt
                | JumpKind::Ifle
        )
    }

    pub fn is_int_comparison(&self) -> bool {
        matches!(
            self,
            JumpKind::IfIcmpeq
                | JumpKind::IfIcmpne
                | JumpKind::IfIcmplt
                | JumpKind::IfIcmpge
                | JumpKind::IfIcmpgt
                | JumpKind::IfIcmple
        )
    }

    pub fn is_object_comparison(&self) -> bool {
        matches!(self, JumpKind::IfAcmpeq | JumpKind::IfAcmpne)
    }

    pub fn is_null_check(&self) -> bool {
        matches!(self, JumpKind::Ifnull | JumpKind::Ifnonnull)
    }
}

impl fmt::Display for JumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Three-way comparison instructions for long, float and double operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpKind {
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
}

impl CmpKind {
    pub const ALL: [CmpKind; 5] = [
        CmpKind::Lcmp,
        CmpKind::Fcmpl,
        CmpKind::Fcmpg,
        CmpKind::Dcmpl,
        CmpKind::Dcmpg,
    ];

    pub fn opcode(&self) -> u8 {
        match self {
            CmpKind::Lcmp => 148,
            CmpKind::Fcmpl => 149,
            CmpKind::Fcmpg => 150,
            CmpKind::Dcmpl => 151,
            CmpKind::Dcmpg => 152,
        }
    }

    pub fn from_opcode(code: i64) -> Option<Self> {
        CmpKind::ALL.into_iter().find(|k| k.opcode() as i64 == code)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            CmpKind::Lcmp => "lcmp",
            CmpKind::Fcmpl => "fcmpl",
            CmpKind::Fcmpg => "fcmpg",
            CmpKind::Dcmpl => "dcmpl",
            CmpKind::Dcmpg => "dcmpg",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        CmpKind::ALL.into_iter().find(|k| k.mnemonic() == name)
    }

    pub fn is_integral(&self) -> bool {
        *self == CmpKind::Lcmp
    }

    /// Result pushed when either operand is NaN.
    pub fn nan_result(&self) -> i64 {
        match self {
            CmpKind::Fcmpg | CmpKind::Dcmpg => 1,
            _ => -1,
        }
    }
}

impl fmt::Display for CmpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
