//! # Structural Subtyping
//!
//! Coerces values decoded under their wire types into the shape a caller
//! expects, so that interfaces can evolve without breaking old peers.
//!
//! ## Rules
//! - **Records** are tolerant: extra wire fields are dropped, and an absent
//!   field becomes `None` when its target type is `opt`.
//! - **Variants** are not: an unknown case fails with `Error::UnknownVariant`.
//! - **Options** are literal: only `opt` values, `null` and `reserved` fill an
//!   `opt` target, and an `opt` value never fills a non-`opt` target.
//! - **Integers**: fixed widths match exactly. A `nat`/`int` may fill a fixed
//!   width of the same signedness when the value fits.
//! - **Reserved** targets accept anything and keep nothing.
//! - **Types first**: [`check_args`] applies the same rules to the wire types,
//!   so a mismatch is reported even when no decoded value would reveal it.
//!   Hash collisions in a target record or variant are always an error.

use std::collections::HashSet;

use num_traits::ToPrimitive;

use crate::error::Error;
use crate::error::Result;
use crate::stack::ensure_sufficient_stack;
use crate::types::sorted_fields;
use crate::types::Type;
use crate::types::TypeEnv;
use crate::value::FieldValue;
use crate::value::Value;

/// Reconciles an argument list with the expected argument types.
///
/// Extra wire arguments are dropped. A missing trailing argument becomes
/// `None` if its type is `opt` and fails with `Error::ArgumentCount` otherwise.
pub fn reconcile_args(env: &TypeEnv, values: Vec<Value>, types: &[Type]) -> Result<Vec<Value>> {
    let found = values.len();
    let mut values = values.into_iter();
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        match values.next() {
            Some(value) => out.push(reconcile(env, value, ty)?),
            None if matches!(env.resolve(ty)?, Type::Opt(_)) => out.push(Value::none()),
            None => return Err(Error::ArgumentCount { expected: types.len(), found }),
        }
    }
    if found > types.len() {
        tracing::trace!(dropped = found - types.len(), "dropping extra arguments");
    }
    Ok(out)
}

/// Checks that each wire argument type can be read as the expected type.
///
/// Extra wire arguments and missing expected ones are left to
/// [`reconcile_args`]. A recursive pair of types is assumed compatible while
/// its check is in progress.
pub fn check_args(wire_env: &TypeEnv, wire: &[Type], env: &TypeEnv, types: &[Type]) -> Result<()> {
    let mut check = TypeCheck { wire_env, env, assumed: HashSet::new() };
    for (wire, target) in wire.iter().zip(types) {
        check.check(wire, target)?;
    }
    Ok(())
}

static NAT8: Type = Type::Nat8;

struct TypeCheck<'e> {
    wire_env: &'e TypeEnv,
    env: &'e TypeEnv,
    assumed: HashSet<(Type, Type)>,
}

impl TypeCheck<'_> {
    fn check(&mut self, wire: &Type, target: &Type) -> Result<()> {
        let named = matches!(wire, Type::Var(_)) || matches!(target, Type::Var(_));
        if named && !self.assumed.insert((wire.clone(), target.clone())) {
            return Ok(());
        }
        ensure_sufficient_stack(|| self.check_resolved(wire, target))
    }

    fn check_resolved(&mut self, wire: &Type, target: &Type) -> Result<()> {
        let (wire_env, env) = (self.wire_env, self.env);
        let wire = wire_env.resolve(wire)?;
        let target = env.resolve(target)?;
        match (wire, target) {
            (_, Type::Reserved) | (Type::Empty, _) => Ok(()),

            (Type::Opt(w), Type::Opt(t)) => self.check(w, t),
            (Type::Null | Type::Reserved, Type::Opt(_)) => Ok(()),

            (Type::Nat, Type::Nat8 | Type::Nat16 | Type::Nat32 | Type::Nat64)
            | (Type::Int, Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64) => Ok(()),

            (Type::Blob | Type::Vec(_), Type::Blob | Type::Vec(_)) => self.check(element(wire), element(target)),

            (Type::Record(wire_fields), Type::Record(fields)) => {
                for field in sorted_fields(fields)? {
                    match wire_fields.iter().find(|w| w.label == field.label) {
                        Some(w) => self.check(&w.ty, &field.ty)?,
                        None if matches!(env.resolve(&field.ty)?, Type::Opt(_)) => {}
                        None => return Err(Error::MissingField(field.label.clone())),
                    }
                }
                Ok(())
            }
            // Cases the target lacks only fail when a value selects them.
            (Type::Variant(wire_fields), Type::Variant(fields)) => {
                sorted_fields(fields)?;
                for w in wire_fields {
                    if let Some(field) = fields.iter().find(|f| f.label == w.label) {
                        self.check(&w.ty, &field.ty)?;
                    }
                }
                Ok(())
            }

            (Type::Func(_), Type::Func(_)) | (Type::Service(_), Type::Service(_)) => Ok(()),
            (wire, target) if wire == target => Ok(()),
            (wire, target) => Err(Error::mismatch(target, wire)),
        }
    }
}

/// The element type of a `vec` or `blob`.
fn element(ty: &Type) -> &Type {
    match ty {
        Type::Vec(elem) => elem,
        _ => &NAT8,
    }
}

/// Coerces one decoded value into `target`.
pub fn reconcile(env: &TypeEnv, value: Value, target: &Type) -> Result<Value> {
    ensure_sufficient_stack(|| reconcile_impl(env, value, target))
}

fn reconcile_impl(env: &TypeEnv, value: Value, target: &Type) -> Result<Value> {
    let target = env.resolve(target)?;
    let value = match (target, value) {
        (Type::Reserved, _) => Value::Reserved,

        (Type::Opt(inner), Value::Opt(Some(v))) => Value::some(reconcile(env, *v, inner)?),
        (Type::Opt(_), Value::Opt(None) | Value::Null | Value::Reserved) => Value::none(),

        (Type::Null, v @ Value::Null)
        | (Type::Bool, v @ Value::Bool(_))
        | (Type::Text, v @ Value::Text(_))
        | (Type::Nat, v @ Value::Nat(_))
        | (Type::Int, v @ Value::Int(_))
        | (Type::Nat8, v @ Value::Nat8(_))
        | (Type::Nat16, v @ Value::Nat16(_))
        | (Type::Nat32, v @ Value::Nat32(_))
        | (Type::Nat64, v @ Value::Nat64(_))
        | (Type::Int8, v @ Value::Int8(_))
        | (Type::Int16, v @ Value::Int16(_))
        | (Type::Int32, v @ Value::Int32(_))
        | (Type::Int64, v @ Value::Int64(_))
        | (Type::Float32, v @ Value::Float32(_))
        | (Type::Float64, v @ Value::Float64(_))
        | (Type::Principal, v @ Value::Principal(_))
        | (Type::Func(_), v @ Value::Func(..))
        | (Type::Service(_), v @ Value::Service(_)) => v,

        (Type::Nat8, Value::Nat(n)) => Value::Nat8(narrow(target, n.to_u8())?),
        (Type::Nat16, Value::Nat(n)) => Value::Nat16(narrow(target, n.to_u16())?),
        (Type::Nat32, Value::Nat(n)) => Value::Nat32(narrow(target, n.to_u32())?),
        (Type::Nat64, Value::Nat(n)) => Value::Nat64(narrow(target, n.to_u64())?),
        (Type::Int8, Value::Int(n)) => Value::Int8(narrow(target, n.to_i8())?),
        (Type::Int16, Value::Int(n)) => Value::Int16(narrow(target, n.to_i16())?),
        (Type::Int32, Value::Int(n)) => Value::Int32(narrow(target, n.to_i32())?),
        (Type::Int64, Value::Int(n)) => Value::Int64(narrow(target, n.to_i64())?),

        (Type::Blob, Value::Blob(bytes)) => Value::Blob(bytes),
        (Type::Blob, Value::Vec(items)) => Value::Blob(bytes_of(env, items)?),
        (Type::Vec(elem), Value::Blob(bytes)) => {
            if !matches!(env.resolve(elem)?, Type::Nat8) {
                return Err(Error::mismatch(target, "blob"));
            }
            Value::Blob(bytes)
        }
        (Type::Vec(elem), Value::Vec(items)) => {
            if matches!(env.resolve(elem)?, Type::Nat8) {
                Value::Blob(bytes_of(env, items)?)
            } else {
                let items = items
                    .into_iter()
                    .map(|item| reconcile(env, item, elem))
                    .collect::<Result<Vec<_>>>()?;
                Value::Vec(items)
            }
        }

        (Type::Record(fields), Value::Record(mut wire)) => {
            sorted_fields(fields)?;
            let mut out = Vec::with_capacity(fields.len());
            for field in fields {
                let value = match wire.iter().position(|w| w.label == field.label) {
                    Some(i) => reconcile(env, wire.swap_remove(i).value, &field.ty)?,
                    None if matches!(env.resolve(&field.ty)?, Type::Opt(_)) => Value::none(),
                    None => return Err(Error::MissingField(field.label.clone())),
                };
                out.push(FieldValue { label: field.label.clone(), value });
            }
            if !wire.is_empty() {
                tracing::trace!(dropped = wire.len(), "dropping unknown record fields");
            }
            Value::Record(out)
        }

        (Type::Variant(fields), Value::Variant(active)) => {
            sorted_fields(fields)?;
            let FieldValue { label, value } = *active;
            let field = fields
                .iter()
                .find(|f| f.label == label)
                .ok_or(Error::UnknownVariant(label.id()))?;
            let value = reconcile(env, value, &field.ty)?;
            Value::Variant(Box::new(FieldValue { label: field.label.clone(), value }))
        }

        (target, value) => return Err(Error::mismatch(target, value.kind())),
    };
    Ok(value)
}

fn narrow<T>(target: &Type, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::mismatch(target, "out of range integer"))
}

fn bytes_of(env: &TypeEnv, items: Vec<Value>) -> Result<Vec<u8>> {
    items
        .into_iter()
        .map(|item| match reconcile(env, item, &Type::Nat8)? {
            Value::Nat8(b) => Ok(b),
            other => Err(Error::mismatch(Type::Nat8, other.kind())),
        })
        .collect()
}
