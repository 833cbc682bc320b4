use std::collections::HashMap;

use heurist_bytecode::{
    ClassFile, CmpKind, FieldDef, InvokeKind, JumpKind, Method, MethodDescriptor, MethodRef, Op,
    Value,
};

use crate::error::AsmError;
use crate::lexer::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<ClassFile, AsmError> {
    let mut parser = Parser::default();
    for line in split_lines(tokens) {
        parser.statement(&line)?;
    }
    parser.finish()
}

fn split_lines(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    for tok in tokens {
        if tok.kind == TokenKind::Newline {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
        } else {
            current.push(tok);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct MethodBuilder {
    name: String,
    descriptor: String,
    is_static: bool,
    locals: Option<u16>,
    code: Vec<Op>,
    labels: HashMap<String, u32>,
    /// (instruction index, label, source line) of jumps awaiting a target.
    fixups: Vec<(usize, String, usize)>,
    start_line: usize,
}

#[derive(Default)]
struct Parser {
    class: Option<ClassFile>,
    method: Option<MethodBuilder>,
}

/// Cursor over the tokens of one source line.
struct Line<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Line<'a> {
    fn number(&self) -> usize {
        self.tokens.first().map(|t| t.line).unwrap_or(0)
    }

    fn error(&self, msg: impl Into<String>) -> AsmError {
        AsmError::Parse { line: self.number(), msg: msg.into() }
    }

    fn next(&mut self) -> Option<&'a TokenKind> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(&tok.kind)
    }

    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn word(&mut self, what: &str) -> Result<String, AsmError> {
        match self.next() {
            Some(TokenKind::Word(w)) => Ok(w.clone()),
            Some(other) => Err(self.error(format!("expected {what}, got {other:?}"))),
            None => Err(self.error(format!("expected {what}"))),
        }
    }

    fn uint<T: TryFrom<i64>>(&mut self, what: &str) -> Result<T, AsmError> {
        match self.next() {
            Some(TokenKind::IntLit(n)) => {
                T::try_from(*n).map_err(|_| self.error(format!("{what} out of range: {n}")))
            }
            Some(other) => Err(self.error(format!("expected {what}, got {other:?}"))),
            None => Err(self.error(format!("expected {what}"))),
        }
    }

    fn descriptor(&mut self) -> Result<String, AsmError> {
        match self.next() {
            Some(TokenKind::Descriptor(d)) => {
                MethodDescriptor::parse(d).map_err(|e| self.error(e.to_string()))?;
                Ok(d.clone())
            }
            Some(other) => Err(self.error(format!("expected method descriptor, got {other:?}"))),
            None => Err(self.error("expected method descriptor")),
        }
    }

    fn literal(&mut self) -> Result<Value, AsmError> {
        match self.next() {
            Some(TokenKind::IntLit(n)) => Ok(Value::Int(*n)),
            Some(TokenKind::FloatLit(f)) => Ok(Value::Float(*f)),
            Some(TokenKind::StringLit(s)) => Ok(Value::String(s.clone())),
            Some(TokenKind::True) => Ok(Value::Bool(true)),
            Some(TokenKind::False) => Ok(Value::Bool(false)),
            Some(TokenKind::Null) => Ok(Value::Null),
            Some(other) => Err(self.error(format!("expected literal, got {other:?}"))),
            None => Err(self.error("expected literal")),
        }
    }

    fn end(&self) -> Result<(), AsmError> {
        match self.peek() {
            None => Ok(()),
            Some(extra) => Err(self.error(format!("unexpected {extra:?}"))),
        }
    }
}

impl Parser {
    fn statement(&mut self, tokens: &[Token]) -> Result<(), AsmError> {
        let mut line = Line { tokens, pos: 0 };
        if let Some(TokenKind::Label(name)) = line.peek() {
            line.next();
            let number = line.number();
            let m = self.method_mut(&line)?;
            let ip = m.code.len() as u32;
            if m.labels.insert(name.clone(), ip).is_some() {
                return Err(AsmError::Parse { line: number, msg: format!("duplicate label {name}") });
            }
            if line.peek().is_none() {
                return Ok(());
            }
        }
        match line.next() {
            Some(TokenKind::Directive(d)) => self.directive(d, &mut line),
            Some(TokenKind::Word(mnemonic)) => self.instruction(mnemonic, &mut line),
            Some(other) => Err(line.error(format!("expected directive or instruction, got {other:?}"))),
            None => Ok(()),
        }
    }

    fn directive(&mut self, name: &str, line: &mut Line<'_>) -> Result<(), AsmError> {
        match name {
            "class" => {
                if self.class.is_some() {
                    return Err(line.error("duplicate .class"));
                }
                let class_name = line.word("class name")?;
                if class_name.contains('.') {
                    return Err(line.error(format!("class names use slashes: {class_name}")));
                }
                line.end()?;
                self.class = Some(ClassFile::new(class_name));
            }
            "source" => {
                let source = match line.next() {
                    Some(TokenKind::Word(w)) | Some(TokenKind::StringLit(w)) => w.clone(),
                    _ => return Err(line.error("expected source file name")),
                };
                line.end()?;
                self.class_mut(line)?.source_file = Some(source);
            }
            "field" => {
                let name = line.word("field name")?;
                let descriptor = line.word("field descriptor")?;
                line.end()?;
                self.class_mut(line)?.fields.push(FieldDef { name, descriptor });
            }
            "method" => {
                self.class_mut(line)?;
                if self.method.is_some() {
                    return Err(line.error("nested .method (missing .end)"));
                }
                let mut is_static = false;
                let mut name = line.word("method name")?;
                if name == "static" {
                    is_static = true;
                    name = line.word("method name")?;
                }
                let descriptor = line.descriptor()?;
                line.end()?;
                self.method = Some(MethodBuilder {
                    name,
                    descriptor,
                    is_static,
                    locals: None,
                    code: Vec::new(),
                    labels: HashMap::new(),
                    fixups: Vec::new(),
                    start_line: line.number(),
                });
            }
            "locals" => {
                let n = line.uint::<u16>("local count")?;
                line.end()?;
                self.method_mut(line)?.locals = Some(n);
            }
            "line" => {
                let n = line.uint::<u32>("line number")?;
                line.end()?;
                self.method_mut(line)?.code.push(Op::Line(n));
            }
            "end" => {
                line.end()?;
                let m = self.method.take().ok_or_else(|| line.error(".end outside a method"))?;
                let method = m.build()?;
                self.class_mut(line)?.add_method(method);
            }
            other => return Err(line.error(format!("unknown directive .{other}"))),
        }
        Ok(())
    }

    fn instruction(&mut self, mnemonic: &str, line: &mut Line<'_>) -> Result<(), AsmError> {
        let number = line.number();
        let op = if let Some(kind) = JumpKind::from_mnemonic(mnemonic) {
            let label = line.word("label")?;
            let m = self.method_mut(line)?;
            m.fixups.push((m.code.len(), label, number));
            Op::Jump(kind, 0)
        } else if let Some(kind) = CmpKind::from_mnemonic(mnemonic) {
            Op::Cmp(kind)
        } else if let Some(kind) = InvokeKind::from_mnemonic(mnemonic) {
            let owner = line.word("owner class")?;
            let name = line.word("method name")?;
            let descriptor = line.descriptor()?;
            let idx = self
                .class_mut(line)?
                .add_method_ref(MethodRef::new(kind, owner, name, descriptor));
            Op::Invoke(idx)
        } else {
            match mnemonic {
                "push" => {
                    let value = line.literal()?;
                    Op::PushConst(self.class_mut(line)?.add_const(value))
                }
                "load" => Op::LoadLocal(line.uint("local index")?),
                "store" => Op::StoreLocal(line.uint("local index")?),
                "throw" => {
                    let exception = line.word("exception class")?;
                    let exception = exception.replace('/', ".");
                    Op::Throw(self.class_mut(line)?.add_const(Value::String(exception)))
                }
                "newlist" => Op::MakeList(line.uint("element count")?),
                "ret" => Op::Ret,
                "add" => Op::Add,
                "sub" => Op::Sub,
                "mul" => Op::Mul,
                "div" => Op::Div,
                "rem" => Op::Rem,
                "neg" => Op::Neg,
                "concat" => Op::Concat,
                "i2d" => Op::IntToFloat,
                "d2i" => Op::FloatToInt,
                "pop" => Op::Pop,
                "dup" => Op::Dup,
                "dup2" => Op::Dup2,
                "swap" => Op::Swap,
                "listlen" => Op::ListLen,
                "listget" => Op::ListGet,
                "nop" => Op::Nop,
                other => return Err(line.error(format!("unknown instruction {other}"))),
            }
        };
        line.end()?;
        self.method_mut(line)?.code.push(op);
        Ok(())
    }

    fn class_mut(&mut self, line: &Line<'_>) -> Result<&mut ClassFile, AsmError> {
        self.class
            .as_mut()
            .ok_or_else(|| line.error("missing .class directive"))
    }

    fn method_mut(&mut self, line: &Line<'_>) -> Result<&mut MethodBuilder, AsmError> {
        self.method
            .as_mut()
            .ok_or_else(|| line.error("instruction outside a method"))
    }

    fn finish(self) -> Result<ClassFile, AsmError> {
        if let Some(m) = self.method {
            return Err(AsmError::Parse {
                line: m.start_line,
                msg: format!("method {} is missing .end", m.name),
            });
        }
        self.class.ok_or(AsmError::Parse { line: 1, msg: "missing .class directive".into() })
    }
}

impl MethodBuilder {
    fn build(mut self) -> Result<Method, AsmError> {
        for (ip, label, line) in std::mem::take(&mut self.fixups) {
            let target = *self
                .labels
                .get(&label)
                .ok_or_else(|| AsmError::Parse { line, msg: format!("undefined label {label}") })?;
            if let Op::Jump(_, t) = &mut self.code[ip] {
                *t = target;
            }
        }

        let params = MethodDescriptor::parse(&self.descriptor)
            .map(|d| d.arg_count())
            .unwrap_or(0)
            + usize::from(!self.is_static);
        let used = self
            .code
            .iter()
            .filter_map(|op| match op {
                Op::LoadLocal(i) | Op::StoreLocal(i) => Some(*i as usize + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let locals = match self.locals {
            Some(n) => n,
            None => u16::try_from(params.max(used)).map_err(|_| AsmError::Parse {
                line: self.start_line,
                msg: "too many locals".into(),
            })?,
        };

        Ok(Method {
            name: self.name,
            descriptor: self.descriptor,
            is_static: self.is_static,
            locals,
            code: self.code,
        })
    }
}
