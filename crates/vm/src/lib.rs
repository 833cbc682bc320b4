pub mod error;
pub mod library;
pub mod native;
#[cfg(test)]
mod tests;
pub mod vm;

pub use error::{JavaException, VmError};
pub use native::{MethodKey, NativeError, NativeFn, NativeRegistry, NativeResult};
pub use vm::Vm;
