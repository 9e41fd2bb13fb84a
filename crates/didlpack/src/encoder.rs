//! # Encoder
//!
//! Serializes `(Value, Type)` pairs into a `DIDL` message.
//!
//! ## Layout
//! `"DIDL" [table count][entries..] [arg count][type refs..] [values..]`
//!
//! ## Invariants
//! - **Pairing**: every value is written under exactly one type. A value whose
//!   shape does not match its type fails with `Error::EncodeValue`.
//! - **Field Order**: record fields are written in ascending hash order and
//!   variant cases by their position in that order, whatever order the value lists them in.
//! - **Atomicity**: the table and value buffers are only assembled in
//!   [`Encoder::into_bytes`], so a failed `arg` leaves nothing half written.

use num_bigint::BigInt;

use crate::error::Error;
use crate::error::Result;
use crate::leb128;
use crate::principal::Principal;
use crate::stack::ensure_sufficient_stack;
use crate::table::TypeTable;
use crate::types::sorted_fields;
use crate::types::Field;
use crate::types::Type;
use crate::types::TypeEnv;
use crate::value::FieldValue;
use crate::value::Value;

/// The four bytes every message starts with.
pub const MAGIC: [u8; 4] = *b"DIDL";

/// Accumulates arguments for one message.
///
/// ```
/// use didlpack::{Encoder, Type, TypeEnv, Value};
///
/// let env = TypeEnv::new();
/// let mut enc = Encoder::new(&env);
/// enc.arg(&Value::nat(0u32), &Type::Nat)?;
/// assert_eq!(enc.into_bytes(), b"DIDL\x00\x01\x7d\x00");
/// # Ok::<(), didlpack::Error>(())
/// ```
#[derive(Debug)]
pub struct Encoder<'e> {
    env: &'e TypeEnv,
    table: TypeTable<'e>,
    args: usize,
    /// Argument type references, written as each argument is added.
    refs: Vec<u8>,
    values: Vec<u8>,
}

impl<'e> Encoder<'e> {
    pub fn new(env: &'e TypeEnv) -> Self {
        Self {
            env,
            table: TypeTable::new(env),
            args: 0,
            refs: Vec::new(),
            values: Vec::with_capacity(256),
        }
    }

    /// Appends one argument.
    ///
    /// # Errors
    /// `Error::EncodeValue` if `value` does not fit `ty`; `Error::UnboundType`
    /// or `Error::HashCollision` if `ty` itself is invalid.
    pub fn arg(&mut self, value: &Value, ty: &Type) -> Result<&mut Self> {
        let mut scratch = Vec::new();
        encode_value(&mut scratch, self.env, value, ty)?;
        self.table.add_type_definition(ty)?;
        self.table.encode_type_ref(&mut self.refs, ty)?;
        self.values.extend_from_slice(&scratch);
        self.args += 1;
        Ok(self)
    }

    /// Assembles the message: magic, table, argument type references, values.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAGIC.len() + self.values.len() + 16);
        buf.extend_from_slice(&MAGIC);
        self.table.write(&mut buf);
        leb128::encode_u64(&mut buf, self.args as u64);
        buf.extend_from_slice(&self.refs);
        buf.extend_from_slice(&self.values);
        tracing::debug!(
            args = self.args,
            table = self.table.len(),
            bytes = buf.len(),
            "encoded message"
        );
        buf
    }
}

/// Encodes `values` under `types`, which must have the same length.
///
/// A record value may leave out fields whose type is `opt`; they are written
/// as `none`. Every other shape difference, including a label listed twice,
/// fails with `Error::EncodeValue`.
pub fn encode(values: &[Value], types: &[Type]) -> Result<Vec<u8>> {
    encode_with_env(&TypeEnv::new(), values, types)
}

/// Like [`encode`], resolving `Type::Var` references in `env`.
pub fn encode_with_env(env: &TypeEnv, values: &[Value], types: &[Type]) -> Result<Vec<u8>> {
    if values.len() != types.len() {
        return Err(Error::ArgumentCount { expected: types.len(), found: values.len() });
    }
    let mut enc = Encoder::new(env);
    for (value, ty) in values.iter().zip(types) {
        enc.arg(value, ty)?;
    }
    Ok(enc.into_bytes())
}

/// Writes the type-directed encoding of `value` to `buf`.
pub fn encode_value(buf: &mut Vec<u8>, env: &TypeEnv, value: &Value, ty: &Type) -> Result<()> {
    ensure_sufficient_stack(|| encode_value_impl(buf, env, value, ty))
}

fn encode_value_impl(buf: &mut Vec<u8>, env: &TypeEnv, value: &Value, ty: &Type) -> Result<()> {
    let ty = env.resolve(ty)?;
    match (ty, value) {
        (Type::Null, Value::Null) => {}
        (Type::Reserved, _) => {}
        (Type::Bool, Value::Bool(b)) => buf.push(*b as u8),
        (Type::Nat, Value::Nat(n)) => leb128::encode_unsigned(buf, n),
        (Type::Int, Value::Int(n)) => leb128::encode_signed(buf, n),
        // nat <: int
        (Type::Int, Value::Nat(n)) => leb128::encode_signed(buf, &BigInt::from(n.clone())),
        (Type::Nat8, Value::Nat8(v)) => buf.push(*v),
        (Type::Nat16, Value::Nat16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Nat32, Value::Nat32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Nat64, Value::Nat64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Int8, Value::Int8(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Int16, Value::Int16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Int32, Value::Int32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Int64, Value::Int64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Float32, Value::Float32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Float64, Value::Float64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (Type::Text, Value::Text(s)) => write_bytes(buf, s.as_bytes()),
        (Type::Principal, Value::Principal(p)) => write_principal(buf, p),
        (Type::Blob, Value::Blob(bytes)) => write_bytes(buf, bytes),
        (Type::Vec(elem), Value::Blob(bytes)) => {
            if !matches!(env.resolve(elem)?, Type::Nat8) {
                return Err(Error::encode_value(ty, "blob"));
            }
            write_bytes(buf, bytes);
        }
        (Type::Blob, Value::Vec(items)) => {
            leb128::encode_u64(buf, items.len() as u64);
            for item in items {
                encode_value_impl(buf, env, item, &Type::Nat8)?;
            }
        }
        (Type::Vec(elem), Value::Vec(items)) => {
            leb128::encode_u64(buf, items.len() as u64);
            for item in items {
                encode_value(buf, env, item, elem)?;
            }
        }
        (Type::Opt(_), Value::Opt(None)) => buf.push(0),
        (Type::Opt(inner), Value::Opt(Some(v))) => {
            buf.push(1);
            encode_value(buf, env, v, inner)?;
        }
        (Type::Record(fields), Value::Record(values)) => encode_record(buf, env, fields, values)?,
        (Type::Variant(fields), Value::Variant(active)) => {
            let sorted = sorted_fields(fields)?;
            let index = sorted
                .iter()
                .position(|f| f.label == active.label)
                .ok_or_else(|| Error::encode_value(ty, format!("variant case {}", active.label)))?;
            leb128::encode_u64(buf, index as u64);
            encode_value(buf, env, &active.value, &sorted[index].ty)?;
        }
        (Type::Func(_), Value::Func(service, method)) => {
            buf.push(1);
            write_principal(buf, service);
            write_bytes(buf, method.as_bytes());
        }
        (Type::Service(_), Value::Service(service)) => write_principal(buf, service),
        (ty, value) => return Err(Error::encode_value(ty, value.kind())),
    }
    Ok(())
}

fn encode_record(buf: &mut Vec<u8>, env: &TypeEnv, fields: &[Field], values: &[FieldValue]) -> Result<()> {
    if let Some(extra) = values.iter().find(|v| !fields.iter().any(|f| f.label == v.label)) {
        return Err(Error::encode_value(
            Type::Record(fields.to_vec()),
            format!("record with field {}", extra.label),
        ));
    }
    for (i, v) in values.iter().enumerate() {
        if values[..i].iter().any(|prev| prev.label == v.label) {
            return Err(Error::encode_value(
                Type::Record(fields.to_vec()),
                format!("record with field {} twice", v.label),
            ));
        }
    }
    for field in sorted_fields(fields)? {
        match values.iter().find(|v| v.label == field.label) {
            Some(v) => encode_value(buf, env, &v.value, &field.ty)?,
            None if matches!(env.resolve(&field.ty)?, Type::Opt(_)) => buf.push(0),
            None => {
                return Err(Error::encode_value(
                    format!("record field {} : {}", field.label, field.ty),
                    "nothing",
                ));
            }
        }
    }
    Ok(())
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    leb128::encode_u64(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn write_principal(buf: &mut Vec<u8>, principal: &Principal) {
    buf.push(1);
    write_bytes(buf, principal.as_slice());
}
