//! Conversions between Rust values and [`Value`].
//!
//! `From` builds values for encoding; [`FromValue`] extracts Rust values from
//! decoded ones, failing with `Error::Unmarshal` when the shapes disagree.

use num_bigint::BigInt;
use num_bigint::BigUint;

use crate::error::Error;
use crate::error::Result;
use crate::principal::Principal;
use crate::value::Value;

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    u8 => Nat8,
    u16 => Nat16,
    u32 => Nat32,
    u64 => Nat64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    BigUint => Nat,
    BigInt => Int,
    Principal => Principal,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Value::Opt(v.map(|inner| Box::new(inner.into())))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Vec(v.into_iter().map(Into::into).collect())
    }
}

/// Extracts a Rust value from a decoded [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn unmarshal<T>(want: &str, found: &Value) -> Result<T> {
    Err(Error::Unmarshal(format!("cannot read {} as {}", found.kind(), want)))
}

macro_rules! from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => unmarshal(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

from_value! {
    bool => Bool,
    u8 => Nat8,
    u16 => Nat16,
    u32 => Nat32,
    u64 => Nat64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    Principal => Principal,
}

impl FromValue for BigUint {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Nat(n) => Ok(n),
            Value::Nat8(n) => Ok(n.into()),
            Value::Nat16(n) => Ok(n.into()),
            Value::Nat32(n) => Ok(n.into()),
            Value::Nat64(n) => Ok(n.into()),
            other => unmarshal("nat", &other),
        }
    }
}

impl FromValue for BigInt {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(n),
            Value::Nat(n) => Ok(n.into()),
            Value::Int8(n) => Ok(n.into()),
            Value::Int16(n) => Ok(n.into()),
            Value::Int32(n) => Ok(n.into()),
            Value::Int64(n) => Ok(n.into()),
            other => unmarshal("int", &other),
        }
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null | Value::Reserved => Ok(()),
            other => unmarshal("null", &other),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

/// `null` and `reserved` read as `None`, so an absent field and an empty one stay distinct.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Opt(None) | Value::Null | Value::Reserved => Ok(None),
            Value::Opt(Some(inner)) => T::from_value(*inner).map(Some),
            other => unmarshal("opt", &other),
        }
    }
}

/// Reads `vec` and `blob` values; a blob yields one `Nat8` per byte.
impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Vec(items) => items.into_iter().map(T::from_value).collect(),
            Value::Blob(bytes) => bytes.into_iter().map(|b| T::from_value(Value::Nat8(b))).collect(),
            other => unmarshal("vec", &other),
        }
    }
}

impl Value {
    /// Extracts a Rust value, see [`FromValue`].
    pub fn into_rust<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }

    /// Removes and extracts a record field; an absent field reads as `null`.
    pub fn take_field<T: FromValue>(&mut self, label: impl Into<crate::types::Label>) -> Result<T> {
        let label = label.into();
        let Value::Record(fields) = self else {
            return unmarshal("record", self);
        };
        let value = match fields.iter().position(|f| f.label == label) {
            Some(i) => fields.remove(i).value,
            None => Value::Null,
        };
        T::from_value(value).map_err(|err| match err {
            Error::Unmarshal(msg) => Error::Unmarshal(format!("field {}: {}", label, msg)),
            other => other,
        })
    }
}
