//! # Values
//!
//! A closed tagged union of every IDL value. A `Value` carries no type: it
//! must be paired with exactly one [`Type`](crate::Type) to be encoded, and
//! illegal pairings are reported as `Error::EncodeValue`.

use num_bigint::BigInt;
use num_bigint::BigUint;

use crate::principal::Principal;
use crate::types::Label;

/// A labelled record member or the active case of a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub label: Label,
    pub value: Value,
}

impl FieldValue {
    pub fn new(label: impl Into<Label>, value: Value) -> Self {
        Self { label: label.into(), value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
    Nat(BigUint),
    Int(BigInt),
    Nat8(u8),
    Nat16(u16),
    Nat32(u32),
    Nat64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Principal(Principal),
    /// The value of a `reserved` type; carries nothing.
    Reserved,
    Vec(Vec<Value>),
    Opt(Option<Box<Value>>),
    Record(Vec<FieldValue>),
    Variant(Box<FieldValue>),
    /// A function reference: the service and the method name.
    Func(Principal, String),
    /// A service reference.
    Service(Principal),
}

impl Value {
    pub fn nat(n: impl Into<BigUint>) -> Self {
        Value::Nat(n.into())
    }

    pub fn int(n: impl Into<BigInt>) -> Self {
        Value::Int(n.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn some(inner: Value) -> Self {
        Value::Opt(Some(Box::new(inner)))
    }

    pub fn none() -> Self {
        Value::Opt(None)
    }

    pub fn record<L: Into<Label>>(fields: impl IntoIterator<Item = (L, Value)>) -> Self {
        Value::Record(fields.into_iter().map(|(l, v)| FieldValue::new(l, v)).collect())
    }

    /// A record whose fields are tuple positions `0..n`.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Record(
            items
                .into_iter()
                .enumerate()
                .map(|(i, value)| FieldValue { label: Label::Unnamed(i as u32), value })
                .collect(),
        )
    }

    pub fn variant(label: impl Into<Label>, value: Value) -> Self {
        Value::Variant(Box::new(FieldValue::new(label, value)))
    }

    /// Looks up a record field by label.
    pub fn field(&self, label: impl Into<Label>) -> Option<&Value> {
        let label = label.into();
        match self {
            Value::Record(fields) => fields.iter().find(|f| f.label == label).map(|f| &f.value),
            _ => None,
        }
    }

    /// A short description of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Nat(_) => "nat",
            Value::Int(_) => "int",
            Value::Nat8(_) => "nat8",
            Value::Nat16(_) => "nat16",
            Value::Nat32(_) => "nat32",
            Value::Nat64(_) => "nat64",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Principal(_) => "principal",
            Value::Reserved => "reserved",
            Value::Vec(_) => "vec",
            Value::Opt(_) => "opt",
            Value::Record(_) => "record",
            Value::Variant(_) => "variant",
            Value::Func(..) => "func",
            Value::Service(_) => "service",
        }
    }
}
