pub mod error;
pub mod truthness;
pub mod heuristic;
pub mod distance;
pub mod jumps;
pub mod comparisons;
pub mod strings;
pub mod numbers;
pub mod regex_distance;

pub use error::DistanceError;
pub use truthness::Truthness;
pub use heuristic::{normalize, HeuristicConfig};
pub use comparisons::NumericComparison;
