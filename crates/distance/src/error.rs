use heurist_bytecode::JumpKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistanceError {
    #[error("invalid truthness: of_true={of_true}, of_false={of_false}")]
    InvalidTruthness { of_true: f64, of_false: f64 },

    #[error("negative distance: {0}")]
    NegativeDistance(f64),

    #[error("invalid heuristic base: {0}")]
    InvalidBase(f64),

    #[error("heuristic value out of [0,1]: {0}")]
    InvalidHeuristic(f64),

    #[error("jump {0} is not supported by this heuristic")]
    UnsupportedJump(JumpKind),

    #[error("invalid heuristic configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("regex too complex for distance computation ({0} states)")]
    RegexTooComplex(usize),
}
