use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::MethodDescriptor;
use crate::opcode::Op;
use crate::value::Value;

/// Magic bytes for .hcls files: "HCLS"
pub const MAGIC: [u8; 4] = [0x48, 0x43, 0x4C, 0x53];
pub const VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
    #[error("invalid method descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("verification failed in {method} at {index}: {msg}")]
    Verify {
        method: String,
        index: usize,
        msg: String,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// How a method reference is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

impl InvokeKind {
    pub fn has_receiver(&self) -> bool {
        *self != InvokeKind::Static
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            InvokeKind::Static => "invokestatic",
            InvokeKind::Virtual => "invokevirtual",
            InvokeKind::Interface => "invokeinterface",
            InvokeKind::Special => "invokespecial",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        match name {
            "invokestatic" => Some(InvokeKind::Static),
            "invokevirtual" => Some(InvokeKind::Virtual),
            "invokeinterface" => Some(InvokeKind::Interface),
            "invokespecial" => Some(InvokeKind::Special),
            _ => None,
        }
    }
}

/// A symbolic reference to a method, possibly declared in another class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Internal name of the declaring class.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: InvokeKind,
}

impl MethodRef {
    pub fn new(
        kind: InvokeKind,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            kind,
        }
    }

    /// Number of values popped from the operand stack by the call.
    pub fn stack_args(&self) -> Result<usize, BytecodeError> {
        let desc = MethodDescriptor::parse(&self.descriptor)?;
        Ok(desc.arg_count() + usize::from(self.kind.has_receiver()))
    }
}

/// A declared field. Only used to describe data classes (DTO schemas).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub descriptor: String,
}

/// A method with its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
    pub locals: u16,
    pub code: Vec<Op>,
}

impl Method {
    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor, BytecodeError> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Static initializers and compiler-generated methods.
    pub fn is_synthetic(&self) -> bool {
        self.name == "<clinit>" || self.name.contains('$')
    }
}

/// A class file: the unit of loading and instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFile {
    /// Internal name, e.g. `com/foo/Bar`.
    pub name: String,
    pub version: u16,
    pub source_file: Option<String>,
    pub constants: Vec<Value>,
    pub method_refs: Vec<MethodRef>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<Method>,
}

impl ClassFile {
    pub fn new(name: impl Into<String>) -> Self {
        ClassFile {
            name: name.into(),
            version: VERSION,
            source_file: None,
            constants: Vec::new(),
            method_refs: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Serialize to JSON (portable text format).
    pub fn to_json(&self) -> Result<String, BytecodeError> {
        serde_json::to_string_pretty(self).map_err(|e| BytecodeError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, BytecodeError> {
        serde_json::from_str(json).map_err(|e| BytecodeError::Serialization(e.to_string()))
    }

    /// Serialize to the binary .hcls format: magic, version, length, payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        let json =
            serde_json::to_vec(self).map_err(|e| BytecodeError::Serialization(e.to_string()))?;
        let len = u32::try_from(json.len())
            .map_err(|_| BytecodeError::InvalidBytecode("class too large".into()))?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&json);
        Ok(buf)
    }

    /// Deserialize from the binary .hcls format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, BytecodeError> {
        if data.len() < 10 {
            return Err(BytecodeError::InvalidBytecode("too short".into()));
        }
        if data[0..4] != MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }
        let len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        if data.len() < 10 + len {
            return Err(BytecodeError::InvalidBytecode("truncated payload".into()));
        }
        serde_json::from_slice(&data[10..10 + len])
            .map_err(|e| BytecodeError::Serialization(e.to_string()))
    }

    /// Add a constant and return its index. Equal constants are shared.
    pub fn add_const(&mut self, value: Value) -> u32 {
        if let Some(idx) = self.constants.iter().position(|c| *c == value) {
            return idx as u32;
        }
        let idx = self.constants.len() as u32;
        self.constants.push(value);
        idx
    }

    /// Add a method reference and return its index. Equal refs are shared.
    pub fn add_method_ref(&mut self, r: MethodRef) -> u32 {
        if let Some(idx) = self.method_refs.iter().position(|m| *m == r) {
            return idx as u32;
        }
        let idx = self.method_refs.len() as u32;
        self.method_refs.push(r);
        idx
    }

    /// Add a method and return its index.
    pub fn add_method(&mut self, method: Method) -> u32 {
        let idx = self.methods.len() as u32;
        self.methods.push(method);
        idx
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}
