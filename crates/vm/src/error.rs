use std::fmt;

use thiserror::Error;

/// An exception raised by target code or by a native method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaException {
    /// Class name with dots, e.g. `java.lang.NullPointerException`.
    pub class: String,
    pub message: Option<String>,
}

impl JavaException {
    pub fn new(class: impl Into<String>, message: Option<String>) -> Self {
        JavaException {
            class: class.into(),
            message,
        }
    }

    pub fn null_pointer() -> Self {
        JavaException::new("java.lang.NullPointerException", None)
    }

    pub fn number_format(input: &str) -> Self {
        JavaException::new(
            "java.lang.NumberFormatException",
            Some(format!("For input string: \"{input}\"")),
        )
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        JavaException::new("java.lang.IllegalArgumentException", Some(message.into()))
    }
}

impl fmt::Display for JavaException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}: {m}", self.class),
            None => write!(f, "{}", self.class),
        }
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow (max {0})")]
    StackOverflow(usize),

    #[error("invalid instruction pointer: {0}")]
    InvalidIp(usize),

    #[error("method not found: {name}{descriptor}")]
    MethodNotFound { name: String, descriptor: String },

    #[error("invalid method reference index: {0}")]
    InvalidMethodRef(u32),

    #[error("unresolved method: {owner}.{name}{descriptor}")]
    UnresolvedMethod {
        owner: String,
        name: String,
        descriptor: String,
    },

    #[error("invalid constant index: {0}")]
    InvalidConstant(u32),

    #[error("invalid local index: {0}")]
    InvalidLocal(u32),

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("uncaught exception {0}")]
    Thrown(JavaException),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("max execution steps exceeded ({0})")]
    ExecutionLimitExceeded(u64),

    #[error("bytecode error: {0}")]
    Bytecode(#[from] heurist_bytecode::BytecodeError),
}
