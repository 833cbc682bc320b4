use heurist_bytecode::BytecodeError;
use heurist_distance::DistanceError;
use heurist_vm::VmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("heuristic error: {0}")]
    Distance(#[from] DistanceError),

    #[error("cannot instrument {method}: {msg}")]
    UnsupportedShape { method: String, msg: String },

    #[error("instrumented code of {method} too long ({len} instructions)")]
    CodeTooLong { method: String, len: usize },

    #[error("class {0} is not loaded")]
    UnknownClass(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("execution error: {0}")]
    Vm(#[from] VmError),

    #[error(transparent)]
    Tracer(#[from] TracerError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TracerError {
    #[error("objective {0} was not reached in this execution")]
    UnknownObjective(String),

    #[error("invalid value {value} for objective {id}: out of range [0,1]")]
    InvalidValue { id: String, value: f64 },

    #[error("invalid template for method replacement: {0:?}")]
    InvalidTemplate(Option<String>),

    #[error("negative number to pad: {0}")]
    NegativePad(i64),

    #[error("not a taint input: {0}")]
    NotTainted(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown replacement category: {0}")]
    UnknownCategory(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid heuristic constants: {0}")]
    Heuristic(#[from] DistanceError),

    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
}
