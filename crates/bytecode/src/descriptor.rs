use std::fmt;

use crate::class_file::BytecodeError;

/// A JVM field type as it appears inside descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// Internal class name, e.g. `java/lang/String`.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a field descriptor such as `I` or `Ljava/lang/String;`.
    pub fn parse(desc: &str) -> Result<Self, BytecodeError> {
        match parse_field(desc) {
            Some((ty, "")) => Ok(ty),
            _ => Err(BytecodeError::InvalidDescriptor(desc.to_string())),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, FieldType::Double | FieldType::Float)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => write!(f, "B"),
            FieldType::Char => write!(f, "C"),
            FieldType::Double => write!(f, "D"),
            FieldType::Float => write!(f, "F"),
            FieldType::Int => write!(f, "I"),
            FieldType::Long => write!(f, "J"),
            FieldType::Short => write!(f, "S"),
            FieldType::Boolean => write!(f, "Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(inner) => write!(f, "[{inner}"),
        }
    }
}

/// A parsed method descriptor such as `(JLjava/lang/String;)Z`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    /// `None` for void methods.
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(desc: &str) -> Result<Self, BytecodeError> {
        let bad = || BytecodeError::InvalidDescriptor(desc.to_string());
        let rest = desc.strip_prefix('(').ok_or_else(bad)?;
        let close = rest.find(')').ok_or_else(bad)?;
        let mut params_src = &rest[..close];
        let ret_src = &rest[close + 1..];

        let mut params = Vec::new();
        while !params_src.is_empty() {
            let (ty, tail) = parse_field(params_src).ok_or_else(bad)?;
            params.push(ty);
            params_src = tail;
        }

        let ret = if ret_src == "V" {
            None
        } else {
            match parse_field(ret_src) {
                Some((ty, "")) => Some(ty),
                _ => return Err(bad()),
            }
        };
        Ok(MethodDescriptor { params, ret })
    }

    pub fn arg_count(&self) -> usize {
        self.params.len()
    }

    pub fn returns_value(&self) -> bool {
        self.ret.is_some()
    }

    /// The same descriptor with an extra trailing parameter.
    pub fn with_appended(&self, extra: FieldType) -> MethodDescriptor {
        let mut params = self.params.clone();
        params.push(extra);
        MethodDescriptor { params, ret: self.ret.clone() }
    }

    /// The same descriptor with a leading parameter, used when an instance
    /// call is rewritten into a static one taking the receiver first.
    pub fn with_receiver(&self, owner: &str) -> MethodDescriptor {
        let mut params = vec![FieldType::Object(owner.to_string())];
        params.extend(self.params.iter().cloned());
        MethodDescriptor { params, ret: self.ret.clone() }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.params {
            write!(f, "{p}")?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(r) => write!(f, "{r}"),
            None => write!(f, "V"),
        }
    }
}

fn parse_field(src: &str) -> Option<(FieldType, &str)> {
    let mut chars = src.chars();
    let first = chars.next()?;
    let tail = &src[1..];
    let ty = match first {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        'L' => {
            let end = tail.find(';')?;
            if end == 0 {
                return None;
            }
            return Some((FieldType::Object(tail[..end].to_string()), &tail[end + 1..]));
        }
        '[' => {
            let (inner, rest) = parse_field(tail)?;
            return Some((FieldType::Array(Box::new(inner)), rest));
        }
        _ => return None,
    };
    Some((ty, tail))
}
