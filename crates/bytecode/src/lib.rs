pub mod opcode;
pub mod class_file;
pub mod class_name;
pub mod descriptor;
pub mod value;
pub mod verify;

pub use opcode::{CmpKind, JumpKind, Op};
pub use class_file::{BytecodeError, ClassFile, FieldDef, InvokeKind, Method, MethodRef};
pub use class_name::ClassName;
pub use descriptor::{FieldType, MethodDescriptor};
pub use value::Value;
