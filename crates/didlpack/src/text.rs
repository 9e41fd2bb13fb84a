//! # Text Rendering
//!
//! Candid text syntax for types and values. Presentation only: nothing here
//! feeds back into the binary codec.

use std::fmt;
use std::fmt::Write as _;

use crate::stack::ensure_sufficient_stack;
use crate::types::Field;
use crate::types::FuncType;
use crate::types::Label;
use crate::types::Type;
use crate::types::TypeEnv;
use crate::value::FieldValue;
use crate::value::Value;

/// Reserved words of the textual IDL. Names matching one are quoted.
pub const KEYWORDS: &[&str] = &[
    "blob", "bool", "composite_query", "empty", "float32", "float64", "func", "import", "int",
    "int8", "int16", "int32", "int64", "nat", "nat8", "nat16", "nat32", "nat64", "null", "oneway",
    "opt", "principal", "query", "record", "reserved", "service", "text", "type", "variant", "vec",
];

/// Whether `name` can be written without quotes.
pub fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&name)
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_ident(name) { f.write_str(name) } else { write_text(f, name) }
}

fn write_text(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_blob(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("blob \"")?;
    for &b in bytes {
        match b {
            b'"' | b'\\' => write!(f, "\\{:02x}", b)?,
            0x20..=0x7e => f.write_char(b as char)?,
            _ => write!(f, "\\{:02x}", b)?,
        }
    }
    f.write_char('"')
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Named(name) => write_name(f, name),
            Label::Id(n) | Label::Unnamed(n) => write!(f, "{}", n),
        }
    }
}

/// Tuple records list their types without labels.
fn is_tuple(fields: &[Field]) -> bool {
    fields
        .iter()
        .enumerate()
        .all(|(i, f)| matches!(f.label, Label::Unnamed(n) if n as usize == i))
}

fn write_fields(f: &mut fmt::Formatter<'_>, keyword: &str, fields: &[Field]) -> fmt::Result {
    if fields.is_empty() {
        return write!(f, "{} {{}}", keyword);
    }
    write!(f, "{} {{ ", keyword)?;
    let tuple = keyword == "record" && is_tuple(fields);
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str("; ")?;
        }
        if tuple {
            write!(f, "{}", field.ty)?;
        } else if keyword == "variant" && field.ty == Type::Null {
            write!(f, "{}", field.label)?;
        } else {
            write!(f, "{} : {}", field.label, field.ty)?;
        }
    }
    f.write_str(" }")
}

fn write_type_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    f.write_char('(')?;
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", ty)?;
    }
    f.write_char(')')
}

/// Renders `(args) -> (rets) modes`, the signature without the `func` keyword.
impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_list(f, &self.args)?;
        f.write_str(" -> ")?;
        write_type_list(f, &self.rets)?;
        for mode in &self.modes {
            write!(f, " {}", mode.keyword())?;
        }
        Ok(())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Type::Null => f.write_str("null"),
            Type::Bool => f.write_str("bool"),
            Type::Nat => f.write_str("nat"),
            Type::Int => f.write_str("int"),
            Type::Nat8 => f.write_str("nat8"),
            Type::Nat16 => f.write_str("nat16"),
            Type::Nat32 => f.write_str("nat32"),
            Type::Nat64 => f.write_str("nat64"),
            Type::Int8 => f.write_str("int8"),
            Type::Int16 => f.write_str("int16"),
            Type::Int32 => f.write_str("int32"),
            Type::Int64 => f.write_str("int64"),
            Type::Float32 => f.write_str("float32"),
            Type::Float64 => f.write_str("float64"),
            Type::Text => f.write_str("text"),
            Type::Reserved => f.write_str("reserved"),
            Type::Empty => f.write_str("empty"),
            Type::Principal => f.write_str("principal"),
            Type::Blob => f.write_str("blob"),
            Type::Var(name) => write_name(f, name),
            Type::Opt(inner) => write!(f, "opt {}", inner),
            Type::Vec(inner) => write!(f, "vec {}", inner),
            Type::Record(fields) => write_fields(f, "record", fields),
            Type::Variant(fields) => write_fields(f, "variant", fields),
            Type::Func(func) => write!(f, "func {}", func),
            Type::Service(methods) => {
                if methods.is_empty() {
                    return f.write_str("service {}");
                }
                f.write_str("service { ")?;
                for (i, method) in methods.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write_name(f, &method.name)?;
                    match &method.ty {
                        Type::Func(func) => write!(f, " : {}", func)?,
                        other => write!(f, " : {}", other)?,
                    }
                }
                f.write_str(" }")
            }
        })
    }
}

/// One `type name = ...;` line per definition.
impl fmt::Display for TypeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, ty) in self.iter() {
            f.write_str("type ")?;
            write_name(f, name)?;
            writeln!(f, " = {};", ty)?;
        }
        Ok(())
    }
}

fn write_field_values(f: &mut fmt::Formatter<'_>, fields: &[FieldValue]) -> fmt::Result {
    if fields.is_empty() {
        return f.write_str("record {}");
    }
    let tuple = fields
        .iter()
        .enumerate()
        .all(|(i, fv)| matches!(fv.label, Label::Unnamed(n) if n as usize == i));
    f.write_str("record { ")?;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str("; ")?;
        }
        if tuple {
            write!(f, "{}", field.value)?;
        } else {
            write!(f, "{} = {}", field.label, field.value)?;
        }
    }
    f.write_str(" }")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Value::Null | Value::Reserved => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write_text(f, s),
            Value::Blob(bytes) => write_blob(f, bytes),
            Value::Nat(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Nat8(n) => write!(f, "{}", n),
            Value::Nat16(n) => write!(f, "{}", n),
            Value::Nat32(n) => write!(f, "{}", n),
            Value::Nat64(n) => write!(f, "{}", n),
            Value::Int8(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(x) => write!(f, "{}", x),
            Value::Float64(x) => write!(f, "{}", x),
            Value::Principal(p) => write!(f, "principal \"{}\"", p),
            Value::Vec(items) if items.is_empty() => f.write_str("vec {}"),
            Value::Vec(items) => {
                f.write_str("vec { ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(" }")
            }
            // Reads back as an absent `opt null`.
            Value::Opt(None) => f.write_str("opt null"),
            Value::Opt(Some(inner)) => write!(f, "opt {}", inner),
            Value::Record(fields) => write_field_values(f, fields),
            Value::Variant(active) if active.value == Value::Null => {
                write!(f, "variant {{ {} }}", active.label)
            }
            Value::Variant(active) => write!(f, "variant {{ {} = {} }}", active.label, active.value),
            Value::Func(service, method) => {
                write!(f, "func \"{}\".", service)?;
                write_name(f, method)
            }
            Value::Service(service) => write!(f, "service \"{}\"", service),
        })
    }
}

/// The annotation a top-level argument needs to read back as the same type.
/// `int` is what an unannotated integer means, so it needs none.
fn annotation(value: &Value) -> Option<&'static str> {
    match value {
        Value::Nat(_) => Some("nat"),
        Value::Nat8(_) => Some("nat8"),
        Value::Nat16(_) => Some("nat16"),
        Value::Nat32(_) => Some("nat32"),
        Value::Nat64(_) => Some("nat64"),
        Value::Int8(_) => Some("int8"),
        Value::Int16(_) => Some("int16"),
        Value::Int32(_) => Some("int32"),
        Value::Int64(_) => Some("int64"),
        Value::Float32(_) => Some("float32"),
        Value::Float64(_) => Some("float64"),
        _ => None,
    }
}

/// Renders an argument list: `(0 : nat)`, `(0)`, `(opt principal "aaaaa-aa")`.
pub fn render_args(values: &[Value]) -> String {
    let mut out = String::from("(");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        // Writing into a String cannot fail.
        let _ = match annotation(value) {
            Some(ty) => write!(out, "{} : {}", value, ty),
            None => write!(out, "{}", value),
        };
    }
    out.push(')');
    out
}
