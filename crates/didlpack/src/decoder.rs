//! # Decoder
//!
//! Reads a `DIDL` message: header, type table, argument types, then values.
//!
//! ## Invariants
//! - **Wire First**: values are always decoded by their *wire* type. A target
//!   type, when given, is applied afterwards by [`reconcile_args`].
//! - **Bounded**: value nesting is capped by [`DecoderConfig::depth_limit`] and
//!   every recursive step runs with enough stack. Every decoded value, zero-sized
//!   ones included, is charged against [`DecoderConfig::value_limit`], so a short
//!   message cannot declare an unbounded `vec null`.
//! - **Exact**: trailing bytes after the last value fail the call unless the
//!   config allows them.

use crate::config::DecoderConfig;
use crate::cursor::Cursor;
use crate::encoder::MAGIC;
use crate::error::Error;
use crate::error::Result;
use crate::leb128;
use crate::principal::Principal;
use crate::stack::ensure_sufficient_stack;
use crate::subtype::check_args;
use crate::subtype::reconcile_args;
use crate::table::read_table;
use crate::table::read_type_ref;
use crate::types::Type;
use crate::types::TypeEnv;
use crate::value::FieldValue;
use crate::value::Value;

/// A fully decoded message, with the wire types it was written under.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The wire type table, as `table0..tableN`.
    pub env: TypeEnv,
    /// Argument types; constructed ones are `Type::Var` into `env`.
    pub types: Vec<Type>,
    pub values: Vec<Value>,
}

/// A bounds-checked reader over one message.
#[derive(Debug)]
pub struct Decoder<'a> {
    cursor: Cursor<'a>,
    config: DecoderConfig,
    /// Values still allowed before `ValueLimitExceeded`.
    budget: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_config(bytes, DecoderConfig::default())
    }

    pub fn with_config(bytes: &'a [u8], config: DecoderConfig) -> Self {
        Self { cursor: Cursor::new(bytes), config, budget: config.value_limit() }
    }

    /// Decodes the whole message, inferring values from the wire types.
    pub fn decode_message(mut self) -> Result<Message> {
        let magic: [u8; 4] = self.cursor.read_array()?;
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let env = read_table(&mut self.cursor, self.config.table_entry_limit())?;
        let argc = leb128::decode_len(&mut self.cursor)?;
        let mut types = Vec::with_capacity(argc.min(self.cursor.remaining()));
        for _ in 0..argc {
            types.push(read_type_ref(&mut self.cursor, env.len())?);
        }

        let mut values = Vec::with_capacity(types.len());
        for ty in &types {
            values.push(self.value(&env, ty, 0)?);
        }

        if !self.cursor.is_empty() {
            if !self.config.trailing_bytes_allowed() {
                return Err(Error::Malformed(format!(
                    "{} trailing bytes after the last argument",
                    self.cursor.remaining()
                )));
            }
            tracing::debug!(trailing = self.cursor.remaining(), "ignoring trailing bytes");
        }

        tracing::debug!(args = values.len(), table = env.len(), "decoded message");
        Ok(Message { env, types, values })
    }

    /// Decodes the message, checks its wire types against `types` and
    /// reconciles its arguments with them.
    pub fn decode_args(self, env: &TypeEnv, types: &[Type]) -> Result<Vec<Value>> {
        let message = self.decode_message()?;
        check_args(&message.env, &message.types, env, types)?;
        reconcile_args(env, message.values, types)
    }

    fn value(&mut self, env: &TypeEnv, ty: &Type, depth: usize) -> Result<Value> {
        if depth > self.config.depth_limit() {
            return Err(Error::RecursionLimitExceeded);
        }
        self.charge()?;
        ensure_sufficient_stack(|| self.value_impl(env, ty, depth))
    }

    fn value_impl(&mut self, env: &TypeEnv, ty: &Type, depth: usize) -> Result<Value> {
        let value = match env.resolve(ty)? {
            Type::Null => Value::Null,
            Type::Reserved => Value::Reserved,
            Type::Bool => match self.cursor.read_byte()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => return Err(Error::Malformed(format!("invalid bool byte {:#04x}", b))),
            },
            Type::Nat => Value::Nat(leb128::decode_unsigned(&mut self.cursor)?),
            Type::Int => Value::Int(leb128::decode_signed(&mut self.cursor)?),
            Type::Nat8 => Value::Nat8(self.cursor.read_byte()?),
            Type::Nat16 => Value::Nat16(u16::from_le_bytes(self.cursor.read_array()?)),
            Type::Nat32 => Value::Nat32(u32::from_le_bytes(self.cursor.read_array()?)),
            Type::Nat64 => Value::Nat64(u64::from_le_bytes(self.cursor.read_array()?)),
            Type::Int8 => Value::Int8(i8::from_le_bytes(self.cursor.read_array()?)),
            Type::Int16 => Value::Int16(i16::from_le_bytes(self.cursor.read_array()?)),
            Type::Int32 => Value::Int32(i32::from_le_bytes(self.cursor.read_array()?)),
            Type::Int64 => Value::Int64(i64::from_le_bytes(self.cursor.read_array()?)),
            Type::Float32 => Value::Float32(f32::from_le_bytes(self.cursor.read_array()?)),
            Type::Float64 => Value::Float64(f64::from_le_bytes(self.cursor.read_array()?)),
            Type::Text => Value::Text(self.text()?),
            Type::Principal => Value::Principal(self.principal()?),
            Type::Empty => return Err(Error::Malformed("a value of type empty cannot exist".into())),
            Type::Blob => Value::Blob(self.bytes()?.to_vec()),
            Type::Vec(elem) if matches!(env.resolve(elem), Ok(Type::Nat8)) => {
                Value::Blob(self.bytes()?.to_vec())
            }
            Type::Vec(elem) => {
                let len = leb128::decode_len(&mut self.cursor)?;
                if len > self.budget {
                    return Err(Error::ValueLimitExceeded { limit: self.config.value_limit() });
                }
                let mut items = Vec::with_capacity(len.min(self.cursor.remaining()));
                for _ in 0..len {
                    items.push(self.value(env, elem, depth + 1)?);
                }
                Value::Vec(items)
            }
            Type::Opt(inner) => match self.cursor.read_byte()? {
                0 => Value::Opt(None),
                1 => Value::some(self.value(env, inner, depth + 1)?),
                b => return Err(Error::Malformed(format!("invalid opt tag {:#04x}", b))),
            },
            Type::Record(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    let value = self.value(env, &field.ty, depth + 1)?;
                    values.push(FieldValue { label: field.label.clone(), value });
                }
                Value::Record(values)
            }
            Type::Variant(fields) => {
                let index = leb128::decode_len(&mut self.cursor)?;
                let field = fields.get(index).ok_or_else(|| {
                    Error::Malformed(format!("variant index {} out of {} cases", index, fields.len()))
                })?;
                let value = self.value(env, &field.ty, depth + 1)?;
                Value::Variant(Box::new(FieldValue { label: field.label.clone(), value }))
            }
            Type::Func(_) => {
                self.reference_tag("func")?;
                let service = self.principal()?;
                Value::Func(service, self.text()?)
            }
            Type::Service(_) => Value::Service(self.principal()?),
            Type::Var(name) => return Err(Error::UnboundType(name.clone())),
        };
        Ok(value)
    }

    fn charge(&mut self) -> Result<()> {
        self.budget = self
            .budget
            .checked_sub(1)
            .ok_or(Error::ValueLimitExceeded { limit: self.config.value_limit() })?;
        Ok(())
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = leb128::decode_len(&mut self.cursor)?;
        self.cursor.read_bytes(len)
    }

    fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| Error::InvalidUtf8)
    }

    /// Transparent references are tagged `1`; opaque ones (`0`) carry no data we can represent.
    fn reference_tag(&mut self, what: &str) -> Result<()> {
        match self.cursor.read_byte()? {
            1 => Ok(()),
            0 => Err(Error::Malformed(format!("opaque {} reference", what))),
            b => Err(Error::Malformed(format!("invalid {} reference tag {:#04x}", what, b))),
        }
    }

    fn principal(&mut self) -> Result<Principal> {
        self.reference_tag("principal")?;
        Principal::from_slice(self.bytes()?)
    }
}

/// Decodes a message, inferring every value from the wire types.
pub fn decode(bytes: &[u8]) -> Result<Vec<Value>> {
    Ok(Decoder::new(bytes).decode_message()?.values)
}

/// Decodes a message against the expected argument types.
pub fn decode_args(bytes: &[u8], types: &[Type]) -> Result<Vec<Value>> {
    decode_args_with_env(bytes, &TypeEnv::new(), types)
}

/// Like [`decode_args`], resolving `Type::Var` references in `env`.
pub fn decode_args_with_env(bytes: &[u8], env: &TypeEnv, types: &[Type]) -> Result<Vec<Value>> {
    Decoder::new(bytes).decode_args(env, types)
}
