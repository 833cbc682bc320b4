use std::collections::BTreeSet;
use std::fmt::Write;

use heurist_bytecode::{ClassFile, Method, Op, Value};

/// Render a class file as `.hasm` source.
///
/// Classes whose constants are all scalars reassemble to an equal class.
/// List and map constants print in display form.
pub fn print(class: &ClassFile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, ".class {}", class.name);
    if let Some(source) = &class.source_file {
        let _ = writeln!(out, ".source {}", quote(source));
    }
    for field in &class.fields {
        let _ = writeln!(out, ".field {} {}", field.name, field.descriptor);
    }
    for method in &class.methods {
        out.push('\n');
        print_method(&mut out, class, method);
    }
    out
}

fn print_method(out: &mut String, class: &ClassFile, method: &Method) {
    let modifier = if method.is_static { "static " } else { "" };
    let _ = writeln!(out, ".method {modifier}{} {}", method.name, method.descriptor);
    let _ = writeln!(out, ".locals {}", method.locals);

    let targets: BTreeSet<u32> = method.code.iter().filter_map(Op::jump_target).collect();
    for (ip, op) in method.code.iter().enumerate() {
        if targets.contains(&(ip as u32)) {
            let _ = writeln!(out, "L{ip}:");
        }
        let _ = writeln!(out, "    {}", instruction(class, op));
    }
    out.push_str(".end\n");
}

/// One instruction as assembly text.
pub fn instruction(class: &ClassFile, op: &Op) -> String {
    match op {
        Op::PushConst(idx) => match class.constants.get(*idx as usize) {
            Some(v) => format!("push {}", literal(v)),
            None => format!("push ?{idx}"),
        },
        Op::LoadLocal(i) => format!("load {i}"),
        Op::StoreLocal(i) => format!("store {i}"),
        Op::Line(n) => format!(".line {n}"),
        Op::Jump(kind, target) => format!("{} L{target}", kind.mnemonic()),
        Op::Invoke(idx) => match class.method_refs.get(*idx as usize) {
            Some(r) => format!("{} {} {} {}", r.kind.mnemonic(), r.owner, r.name, r.descriptor),
            None => format!("invoke ?{idx}"),
        },
        Op::Throw(idx) => match class.constants.get(*idx as usize).and_then(Value::as_str) {
            Some(name) => format!("throw {name}"),
            None => format!("throw ?{idx}"),
        },
        Op::MakeList(n) => format!("newlist {n}"),
        other => other.mnemonic().to_string(),
    }
}

fn literal(v: &Value) -> String {
    match v {
        Value::Float(f) if f.is_nan() => "NaN".into(),
        Value::Float(f) if f.is_infinite() => {
            if *f > 0.0 { "Infinity".into() } else { "-Infinity".into() }
        }
        Value::String(s) => quote(s),
        other => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
