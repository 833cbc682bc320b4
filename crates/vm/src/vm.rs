use std::sync::Arc;

use heurist_bytecode::{ClassFile, CmpKind, JumpKind, MethodDescriptor, Op, Value};
use tracing::trace;

use crate::error::{JavaException, VmError};
use crate::native::{MethodKey, NativeError, NativeRegistry};

const MAX_STACK: usize = 4096;
const MAX_CALL_DEPTH: usize = 256;

/// A call frame on the call stack.
#[derive(Debug, Clone)]
struct CallFrame {
    method_idx: usize,
    ip: usize,
    stack_base: usize,
    locals: Vec<Value>,
    returns_value: bool,
}

/// How a method reference is dispatched, resolved once per VM.
#[derive(Debug, Clone)]
struct CallShape {
    stack_args: usize,
    returns_value: bool,
    /// Index of the target when it is declared by the executing class.
    local: Option<usize>,
}

/// Executes the methods of one class. Not shared between threads: create
/// one per thread over the same `Arc<ClassFile>` and registry.
pub struct Vm {
    class: Arc<ClassFile>,
    natives: Arc<NativeRegistry>,
    shapes: Vec<Option<CallShape>>,
    stack: Vec<Value>,
    call_stack: Vec<CallFrame>,
    step_count: u64,
    max_steps: u64,
}

impl Vm {
    pub fn new(class: Arc<ClassFile>, natives: Arc<NativeRegistry>) -> Self {
        let shapes = class
            .method_refs
            .iter()
            .map(|r| {
                let desc = MethodDescriptor::parse(&r.descriptor).ok()?;
                let local = if r.owner == class.name {
                    class
                        .methods
                        .iter()
                        .position(|m| m.name == r.name && m.descriptor == r.descriptor)
                } else {
                    None
                };
                Some(CallShape {
                    stack_args: desc.arg_count() + usize::from(r.kind.has_receiver()),
                    returns_value: desc.returns_value(),
                    local,
                })
            })
            .collect();
        Vm {
            class,
            natives,
            shapes,
            stack: Vec::with_capacity(256),
            call_stack: Vec::new(),
            step_count: 0,
            max_steps: 10_000_000,
        }
    }

    pub fn set_max_steps(&mut self, max: u64) {
        self.max_steps = max;
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn class(&self) -> &ClassFile {
        &self.class
    }

    /// Invoke a method of the class. For instance methods the receiver is
    /// the first argument. Returns `None` for void methods.
    pub fn invoke(
        &mut self,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let method_idx = self
            .class
            .methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor)
            .ok_or_else(|| VmError::MethodNotFound {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })?;
        let method = &self.class.methods[method_idx];
        let desc = method.parsed_descriptor()?;
        let expected = desc.arg_count() + usize::from(!method.is_static);
        if args.len() != expected {
            return Err(VmError::ArityMismatch {
                expected,
                got: args.len(),
            });
        }

        self.stack.clear();
        self.call_stack.clear();
        self.call_method(method_idx, args)?;
        let result = self.execute();
        if result.is_err() {
            self.stack.clear();
            self.call_stack.clear();
        }
        result
    }

    fn call_method(&mut self, method_idx: usize, args: Vec<Value>) -> Result<(), VmError> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return Err(VmError::StackOverflow(MAX_CALL_DEPTH));
        }
        let method = &self.class.methods[method_idx];
        let returns_value = method.parsed_descriptor()?.returns_value();

        let mut locals = vec![Value::Null; (method.locals as usize).max(args.len())];
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = arg;
        }

        self.call_stack.push(CallFrame {
            method_idx,
            ip: 0,
            stack_base: self.stack.len(),
            locals,
            returns_value,
        });
        Ok(())
    }

    /// Main execution loop. Runs until the outermost frame returns.
    fn execute(&mut self) -> Result<Option<Value>, VmError> {
        let class = Arc::clone(&self.class);
        loop {
            self.step_count += 1;
            if self.step_count > self.max_steps {
                return Err(VmError::ExecutionLimitExceeded(self.max_steps));
            }

            let frame = self.call_stack.last_mut().ok_or(VmError::StackUnderflow)?;
            let method = &class.methods[frame.method_idx];
            let ip = frame.ip;
            let op = method.code.get(ip).ok_or(VmError::InvalidIp(ip))?;

            trace!(method = %method.name, ip, ?op, depth = self.stack.len(), "exec");

            // Advance IP before executing (jumps will override)
            frame.ip = ip + 1;

            match op {
                Op::PushConst(idx) => {
                    let val = class
                        .constants
                        .get(*idx as usize)
                        .ok_or(VmError::InvalidConstant(*idx))?
                        .clone();
                    self.push(val)?;
                }
                Op::LoadLocal(idx) => {
                    let val = self.get_local(*idx)?.clone();
                    self.push(val)?;
                }
                Op::StoreLocal(idx) => {
                    let val = self.pop()?;
                    self.set_local(*idx, val)?;
                }
                Op::Line(_) | Op::Nop => {}
                Op::Jump(kind, target) => {
                    if self.jump_taken(*kind)? {
                        self.jump_to(*target)?;
                    }
                }
                Op::Cmp(kind) => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let r = compare(*kind, &a, &b)?;
                    self.push(Value::Int(r))?;
                }
                Op::Invoke(idx) => self.invoke_ref(*idx)?,
                Op::Ret => {
                    let frame = self.call_stack.pop().ok_or(VmError::StackUnderflow)?;
                    let result = if frame.returns_value {
                        Some(self.pop()?)
                    } else {
                        None
                    };
                    self.stack.truncate(frame.stack_base);
                    if self.call_stack.is_empty() {
                        return Ok(result);
                    }
                    if let Some(v) = result {
                        self.push(v)?;
                    }
                }
                Op::Throw(idx) => {
                    let class_name = class
                        .constants
                        .get(*idx as usize)
                        .and_then(Value::as_str)
                        .ok_or(VmError::InvalidConstant(*idx))?;
                    let message = match self.pop()? {
                        Value::Null => None,
                        other => Some(other.to_java_string()),
                    };
                    return Err(VmError::Thrown(JavaException::new(class_name, message)));
                }
                Op::Add => self.arith(i64::wrapping_add, |x, y| x + y)?,
                Op::Sub => self.arith(i64::wrapping_sub, |x, y| x - y)?,
                Op::Mul => self.arith(i64::wrapping_mul, |x, y| x * y)?,
                Op::Div => {
                    self.check_divisor()?;
                    self.arith(i64::wrapping_div, |x, y| x / y)?
                }
                Op::Rem => {
                    self.check_divisor()?;
                    self.arith(i64::wrapping_rem, |x, y| x % y)?
                }
                Op::Neg => {
                    let v = match self.pop()? {
                        Value::Int(n) => Value::Int(n.wrapping_neg()),
                        Value::Float(f) => Value::Float(-f),
                        other => {
                            return Err(VmError::TypeError {
                                expected: "number",
                                got: other.type_name(),
                            })
                        }
                    };
                    self.push(v)?;
                }
                Op::Concat => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::String(a.to_java_string() + &b.to_java_string()))?;
                }
                Op::IntToFloat => {
                    let v = self.pop()?;
                    let f = v.as_float().ok_or(VmError::TypeError {
                        expected: "number",
                        got: v.type_name(),
                    })?;
                    self.push(Value::Float(f))?;
                }
                Op::FloatToInt => {
                    let v = self.pop()?;
                    let f = v.as_float().ok_or(VmError::TypeError {
                        expected: "number",
                        got: v.type_name(),
                    })?;
                    // saturating, NaN becomes 0, as on the JVM
                    self.push(Value::Int(f as i64))?;
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::Dup => {
                    let v = self.peek(0)?.clone();
                    self.push(v)?;
                }
                Op::Dup2 => {
                    let b = self.peek(0)?.clone();
                    let a = self.peek(1)?.clone();
                    self.push(a)?;
                    self.push(b)?;
                }
                Op::Swap => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(b)?;
                    self.push(a)?;
                }
                Op::MakeList(n) => {
                    let n = *n as usize;
                    if self.stack.len() < n {
                        return Err(VmError::StackUnderflow);
                    }
                    let items = self.stack.split_off(self.stack.len() - n);
                    self.push(Value::List(items))?;
                }
                Op::ListLen => match self.pop()? {
                    Value::List(items) => self.push(Value::Int(items.len() as i64))?,
                    Value::Null => return Err(VmError::Thrown(JavaException::null_pointer())),
                    other => {
                        return Err(VmError::TypeError {
                            expected: "List",
                            got: other.type_name(),
                        })
                    }
                },
                Op::ListGet => {
                    let index = self.pop()?;
                    let list = self.pop()?;
                    let v = match (list, index.as_int()) {
                        (Value::List(items), Some(i)) => {
                            let len = items.len();
                            usize::try_from(i)
                                .ok()
                                .and_then(|i| items.into_iter().nth(i))
                                .ok_or_else(|| {
                                    VmError::Thrown(JavaException::new(
                                        "java.lang.IndexOutOfBoundsException",
                                        Some(format!("Index {i} out of bounds for length {len}")),
                                    ))
                                })?
                        }
                        (Value::Null, _) => {
                            return Err(VmError::Thrown(JavaException::null_pointer()))
                        }
                        (other, _) => {
                            return Err(VmError::TypeError {
                                expected: "List",
                                got: other.type_name(),
                            })
                        }
                    };
                    self.push(v)?;
                }
            }
        }
    }

    fn invoke_ref(&mut self, idx: u32) -> Result<(), VmError> {
        let shape = self
            .shapes
            .get(idx as usize)
            .cloned()
            .flatten()
            .ok_or(VmError::InvalidMethodRef(idx))?;
        if self.stack.len() < shape.stack_args {
            return Err(VmError::StackUnderflow);
        }
        let args = self.stack.split_off(self.stack.len() - shape.stack_args);

        if let Some(local) = shape.local {
            return self.call_method(local, args);
        }

        let r = &self.class.method_refs[idx as usize];
        let key = MethodKey::of(r);
        let native = self
            .natives
            .resolve(&key)
            .ok_or_else(|| VmError::UnresolvedMethod {
                owner: key.owner.clone(),
                name: key.name.clone(),
                descriptor: key.descriptor.clone(),
            })?;
        match native(&args) {
            Ok(result) => {
                if shape.returns_value {
                    self.push(result.unwrap_or(Value::Null))?;
                }
                Ok(())
            }
            Err(NativeError::Thrown(e)) => Err(VmError::Thrown(e)),
            Err(NativeError::Abort(msg)) => Err(VmError::Aborted(msg)),
        }
    }

    fn jump_taken(&mut self, kind: JumpKind) -> Result<bool, VmError> {
        if kind == JumpKind::Goto {
            return Ok(true);
        }
        if kind.is_null_check() {
            let v = self.pop()?;
            return Ok(v.is_null() == (kind == JumpKind::Ifnull));
        }
        if kind.is_object_comparison() {
            let b = self.pop()?;
            let a = self.pop()?;
            return Ok((a == b) == (kind == JumpKind::IfAcmpeq));
        }
        let (a, b) = if kind.is_single_int() {
            (self.pop_int()?, 0)
        } else {
            let b = self.pop_int()?;
            (self.pop_int()?, b)
        };
        Ok(match kind {
            JumpKind::Ifeq | JumpKind::IfIcmpeq => a == b,
            JumpKind::Ifne | JumpKind::IfIcmpne => a != b,
            JumpKind::Iflt | JumpKind::IfIcmplt => a < b,
            JumpKind::Ifge | JumpKind::IfIcmpge => a >= b,
            JumpKind::Ifgt | JumpKind::IfIcmpgt => a > b,
            _ => a <= b,
        })
    }

    fn jump_to(&mut self, target: u32) -> Result<(), VmError> {
        let frame = self.call_stack.last_mut().ok_or(VmError::StackUnderflow)?;
        frame.ip = target as usize;
        Ok(())
    }

    fn check_divisor(&self) -> Result<(), VmError> {
        match (self.peek(0)?, self.peek(1)?) {
            (Value::Int(0), Value::Int(_)) => Err(VmError::Thrown(JavaException::new(
                "java.lang.ArithmeticException",
                Some("/ by zero".into()),
            ))),
            _ => Ok(()),
        }
    }

    fn arith(
        &mut self,
        on_int: impl FnOnce(i64, i64) -> i64,
        on_float: impl FnOnce(f64, f64) -> f64,
    ) -> Result<(), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(on_int(*x, *y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Value::Float(on_float(x, y)),
                _ => {
                    return Err(VmError::TypeError {
                        expected: "number",
                        got: if a.as_float().is_none() { a.type_name() } else { b.type_name() },
                    })
                }
            },
        };
        self.push(result)
    }

    fn push(&mut self, val: Value) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK {
            return Err(VmError::StackOverflow(MAX_STACK));
        }
        self.stack.push(val);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        let base = self.call_stack.last().map(|f| f.stack_base).unwrap_or(0);
        if self.stack.len() <= base {
            return Err(VmError::StackUnderflow);
        }
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_int(&mut self) -> Result<i64, VmError> {
        let v = self.pop()?;
        v.as_int().ok_or(VmError::TypeError {
            expected: "Int",
            got: v.type_name(),
        })
    }

    fn peek(&self, depth: usize) -> Result<&Value, VmError> {
        let len = self.stack.len();
        if depth >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(&self.stack[len - 1 - depth])
    }

    fn get_local(&self, idx: u32) -> Result<&Value, VmError> {
        let frame = self.call_stack.last().ok_or(VmError::StackUnderflow)?;
        frame
            .locals
            .get(idx as usize)
            .ok_or(VmError::InvalidLocal(idx))
    }

    fn set_local(&mut self, idx: u32, val: Value) -> Result<(), VmError> {
        let frame = self.call_stack.last_mut().ok_or(VmError::StackUnderflow)?;
        let slot = frame
            .locals
            .get_mut(idx as usize)
            .ok_or(VmError::InvalidLocal(idx))?;
        *slot = val;
        Ok(())
    }
}

/// Semantics of `lcmp`, `fcmp<op>` and `dcmp<op>`.
pub fn compare(kind: CmpKind, a: &Value, b: &Value) -> Result<i64, VmError> {
    if kind.is_integral() {
        let x = a.as_int().ok_or(VmError::TypeError { expected: "Int", got: a.type_name() })?;
        let y = b.as_int().ok_or(VmError::TypeError { expected: "Int", got: b.type_name() })?;
        return Ok(x.cmp(&y) as i64);
    }
    let x = a.as_float().ok_or(VmError::TypeError { expected: "Float", got: a.type_name() })?;
    let y = b.as_float().ok_or(VmError::TypeError { expected: "Float", got: b.type_name() })?;
    Ok(match x.partial_cmp(&y) {
        Some(ord) => ord as i64,
        None => kind.nan_result(),
    })
}
