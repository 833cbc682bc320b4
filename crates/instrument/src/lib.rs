pub mod category;
pub mod cfg;
pub mod config;
pub mod error;
pub mod ir;
pub mod loader;
pub mod naming;
pub mod passes;
pub mod probes;
pub mod recorder;
pub mod replacement;
pub mod schema;
pub mod tracer;
pub mod units;
#[cfg(test)]
mod tests;

pub use category::{ReplacementCategory, ReplacementType};
pub use config::InstrumentationConfig;
pub use error::{ConfigError, InstrumentError, TracerError};
pub use loader::{InstrumentingClassLoader, LoadedClass};
pub use passes::{ClassReport, Instrumenter, Pass};
pub use recorder::ObjectiveRecorder;
pub use replacement::{MethodReplacement, ReplacementCall, ReplacementRegistry};
pub use tracer::{Action, ExecutionTracer, TargetInfo};
pub use units::{UnitsInfo, UnitsInfoRecorder};
