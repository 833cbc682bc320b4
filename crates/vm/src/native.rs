use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use heurist_bytecode::{MethodRef, Value};

use crate::error::JavaException;

/// Why a native method did not return normally.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeError {
    /// The method threw; the exception propagates into target code.
    Thrown(JavaException),
    /// Stop the whole execution (kill switch).
    Abort(String),
}

impl From<JavaException> for NativeError {
    fn from(e: JavaException) -> Self {
        NativeError::Thrown(e)
    }
}

pub type NativeResult = Result<Option<Value>, NativeError>;

/// A native implementation. For instance methods `args[0]` is the receiver.
pub type NativeFn = dyn Fn(&[Value]) -> NativeResult + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodKey {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        MethodKey {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    pub fn of(r: &MethodRef) -> Self {
        MethodKey::new(&r.owner, &r.name, &r.descriptor)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Resolves calls that leave the executing class.
///
/// Shared between threads behind an `Arc`; each thread runs its own `Vm`.
#[derive(Clone, Default)]
pub struct NativeRegistry {
    methods: HashMap<MethodKey, Arc<NativeFn>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        NativeRegistry::default()
    }

    /// A registry with the platform library installed.
    pub fn with_library() -> Self {
        let mut registry = NativeRegistry::new();
        crate::library::install(&mut registry);
        registry
    }

    pub fn register(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        f: impl Fn(&[Value]) -> NativeResult + Send + Sync + 'static,
    ) {
        self.methods
            .insert(MethodKey::new(owner, name, descriptor), Arc::new(f));
    }

    pub fn register_arc(&mut self, key: MethodKey, f: Arc<NativeFn>) {
        self.methods.insert(key, f);
    }

    pub fn resolve(&self, key: &MethodKey) -> Option<Arc<NativeFn>> {
        self.methods.get(key).cloned()
    }

    pub fn contains(&self, key: &MethodKey) -> bool {
        self.methods.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MethodKey> {
        self.methods.keys()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("methods", &self.methods.len())
            .finish()
    }
}
