use heurist_bytecode::BytecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("lexer error at line {line}, col {col}: {msg}")]
    Lexer { line: usize, col: usize, msg: String },

    #[error("parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("invalid class: {0}")]
    Verify(#[from] BytecodeError),
}
