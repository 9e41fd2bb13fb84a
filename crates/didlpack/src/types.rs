//! # Type Model
//!
//! In-memory representation of every IDL type. Constructed types own their
//! children; recursion goes through `Type::Var`, a name resolved in a
//! [`TypeEnv`], so a type graph is always a finite tree.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::error::Result;

/// Field-name hash: `h = h * 223 + byte (mod 2^32)` over the UTF-8 bytes.
pub fn idl_hash(name: &str) -> u32 {
    name.bytes().fold(0u32, |h, b| h.wrapping_mul(223).wrapping_add(b as u32))
}

/// The signed LEB128 tag identifying a type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Null = -1,
    Bool = -2,
    Nat = -3,
    Int = -4,
    Nat8 = -5,
    Nat16 = -6,
    Nat32 = -7,
    Nat64 = -8,
    Int8 = -9,
    Int16 = -10,
    Int32 = -11,
    Int64 = -12,
    Float32 = -13,
    Float64 = -14,
    Text = -15,
    Reserved = -16,
    Empty = -17,
    Opt = -18,
    Vec = -19,
    Record = -20,
    Variant = -21,
    Func = -22,
    Service = -23,
    Principal = -24,
}

impl Opcode {
    /// Returns the Opcode for a given wire value, or `None` if invalid.
    pub const fn from_i64(v: i64) -> Option<Self> {
        match v {
            -1 => Some(Opcode::Null),
            -2 => Some(Opcode::Bool),
            -3 => Some(Opcode::Nat),
            -4 => Some(Opcode::Int),
            -5 => Some(Opcode::Nat8),
            -6 => Some(Opcode::Nat16),
            -7 => Some(Opcode::Nat32),
            -8 => Some(Opcode::Nat64),
            -9 => Some(Opcode::Int8),
            -10 => Some(Opcode::Int16),
            -11 => Some(Opcode::Int32),
            -12 => Some(Opcode::Int64),
            -13 => Some(Opcode::Float32),
            -14 => Some(Opcode::Float64),
            -15 => Some(Opcode::Text),
            -16 => Some(Opcode::Reserved),
            -17 => Some(Opcode::Empty),
            -18 => Some(Opcode::Opt),
            -19 => Some(Opcode::Vec),
            -20 => Some(Opcode::Record),
            -21 => Some(Opcode::Variant),
            -22 => Some(Opcode::Func),
            -23 => Some(Opcode::Service),
            -24 => Some(Opcode::Principal),
            _ => None,
        }
    }

    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Constructed opcodes only ever appear at the head of a table entry.
    pub const fn is_constructed(self) -> bool {
        matches!(
            self,
            Opcode::Opt | Opcode::Vec | Opcode::Record | Opcode::Variant | Opcode::Func | Opcode::Service
        )
    }

    /// The leaf type for a primitive opcode.
    pub fn primitive(self) -> Option<Type> {
        let ty = match self {
            Opcode::Null => Type::Null,
            Opcode::Bool => Type::Bool,
            Opcode::Nat => Type::Nat,
            Opcode::Int => Type::Int,
            Opcode::Nat8 => Type::Nat8,
            Opcode::Nat16 => Type::Nat16,
            Opcode::Nat32 => Type::Nat32,
            Opcode::Nat64 => Type::Nat64,
            Opcode::Int8 => Type::Int8,
            Opcode::Int16 => Type::Int16,
            Opcode::Int32 => Type::Int32,
            Opcode::Int64 => Type::Int64,
            Opcode::Float32 => Type::Float32,
            Opcode::Float64 => Type::Float64,
            Opcode::Text => Type::Text,
            Opcode::Reserved => Type::Reserved,
            Opcode::Empty => Type::Empty,
            Opcode::Principal => Type::Principal,
            _ => return None,
        };
        Some(ty)
    }
}

/// A record or variant field label.
///
/// Labels compare, hash and order by their 32-bit field hash, which is the
/// only thing the wire carries.
#[derive(Debug, Clone)]
pub enum Label {
    /// A numeric label, written `4895187 : nat` or decoded from the wire.
    Id(u32),
    /// A textual label, hashed with [`idl_hash`].
    Named(String),
    /// A tuple position.
    Unnamed(u32),
}

impl Label {
    pub fn id(&self) -> u32 {
        match self {
            Label::Id(n) | Label::Unnamed(n) => *n,
            Label::Named(name) => idl_hash(name),
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Label {}

impl std::hash::Hash for Label {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::Named(name.to_string())
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Label::Named(name)
    }
}

impl From<u32> for Label {
    fn from(id: u32) -> Self {
        Label::Id(id)
    }
}

/// A labelled member of a record or variant type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub label: Label,
    pub ty: Type,
}

impl Field {
    pub fn new(label: impl Into<Label>, ty: Type) -> Self {
        Self { label: label.into(), ty }
    }
}

/// Function annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FuncMode {
    Query,
    Oneway,
    CompositeQuery,
}

impl FuncMode {
    pub const fn byte(self) -> u8 {
        match self {
            FuncMode::Query => 1,
            FuncMode::Oneway => 2,
            FuncMode::CompositeQuery => 3,
        }
    }

    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(FuncMode::Query),
            2 => Some(FuncMode::Oneway),
            3 => Some(FuncMode::CompositeQuery),
            _ => None,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            FuncMode::Query => "query",
            FuncMode::Oneway => "oneway",
            FuncMode::CompositeQuery => "composite_query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    pub modes: Vec<FuncMode>,
    pub args: Vec<Type>,
    pub rets: Vec<Type>,
}

impl FuncType {
    pub fn new(args: Vec<Type>, rets: Vec<Type>) -> Self {
        Self { modes: Vec::new(), args, rets }
    }

    pub fn with_mode(mut self, mode: FuncMode) -> Self {
        if !self.modes.contains(&mode) {
            self.modes.push(mode);
        }
        self
    }

    /// Query and composite query methods are answered without consensus.
    pub fn is_query(&self) -> bool {
        self.modes.iter().any(|m| matches!(m, FuncMode::Query | FuncMode::CompositeQuery))
    }
}

/// A named service method. `ty` is a `Type::Func` or a `Type::Var` naming one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    pub ty: Type,
}

/// Every IDL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Bool,
    Nat,
    Int,
    Nat8,
    Nat16,
    Nat32,
    Nat64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Reserved,
    Empty,
    Principal,
    /// Shorthand for `vec nat8`; tabled identically.
    Blob,
    /// A reference into the surrounding [`TypeEnv`].
    Var(String),
    Opt(Box<Type>),
    Vec(Box<Type>),
    Record(Vec<Field>),
    Variant(Vec<Field>),
    Func(FuncType),
    Service(Vec<Method>),
}

impl Type {
    pub fn opt(inner: Type) -> Self {
        Type::Opt(Box::new(inner))
    }

    pub fn vec(inner: Type) -> Self {
        Type::Vec(Box::new(inner))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Type::Var(name.into())
    }

    pub fn record<L: Into<Label>>(fields: impl IntoIterator<Item = (L, Type)>) -> Self {
        Type::Record(fields.into_iter().map(|(l, t)| Field::new(l, t)).collect())
    }

    /// A record whose fields are tuple positions `0..n`.
    pub fn tuple(items: impl IntoIterator<Item = Type>) -> Self {
        Type::Record(
            items
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Field { label: Label::Unnamed(i as u32), ty })
                .collect(),
        )
    }

    pub fn variant<L: Into<Label>>(fields: impl IntoIterator<Item = (L, Type)>) -> Self {
        Type::Variant(fields.into_iter().map(|(l, t)| Field::new(l, t)).collect())
    }

    pub fn func(func: FuncType) -> Self {
        Type::Func(func)
    }

    pub fn service<N: Into<String>>(methods: impl IntoIterator<Item = (N, Type)>) -> Self {
        Type::Service(
            methods
                .into_iter()
                .map(|(name, ty)| Method { name: name.into(), ty })
                .collect(),
        )
    }

    /// The wire opcode heading this type. `Var` has none until resolved.
    pub fn opcode(&self) -> Option<Opcode> {
        let op = match self {
            Type::Null => Opcode::Null,
            Type::Bool => Opcode::Bool,
            Type::Nat => Opcode::Nat,
            Type::Int => Opcode::Int,
            Type::Nat8 => Opcode::Nat8,
            Type::Nat16 => Opcode::Nat16,
            Type::Nat32 => Opcode::Nat32,
            Type::Nat64 => Opcode::Nat64,
            Type::Int8 => Opcode::Int8,
            Type::Int16 => Opcode::Int16,
            Type::Int32 => Opcode::Int32,
            Type::Int64 => Opcode::Int64,
            Type::Float32 => Opcode::Float32,
            Type::Float64 => Opcode::Float64,
            Type::Text => Opcode::Text,
            Type::Reserved => Opcode::Reserved,
            Type::Empty => Opcode::Empty,
            Type::Principal => Opcode::Principal,
            Type::Blob | Type::Vec(_) => Opcode::Vec,
            Type::Opt(_) => Opcode::Opt,
            Type::Record(_) => Opcode::Record,
            Type::Variant(_) => Opcode::Variant,
            Type::Func(_) => Opcode::Func,
            Type::Service(_) => Opcode::Service,
            Type::Var(_) => return None,
        };
        Some(op)
    }

    /// Primitive types are referenced by opcode and never tabled.
    pub fn is_primitive(&self) -> bool {
        self.opcode().is_some_and(|op| !op.is_constructed())
    }

    /// The structural identity used to deduplicate table entries: `blob`
    /// becomes `vec nat8`, fields are ordered by hash and methods by name.
    pub(crate) fn canonical(&self) -> Type {
        match self {
            Type::Blob => Type::vec(Type::Nat8),
            Type::Opt(inner) => Type::opt(inner.canonical()),
            Type::Vec(inner) => Type::vec(inner.canonical()),
            Type::Record(fields) => Type::Record(canonical_fields(fields)),
            Type::Variant(fields) => Type::Variant(canonical_fields(fields)),
            Type::Func(func) => Type::Func(FuncType {
                modes: func.modes.clone(),
                args: func.args.iter().map(Type::canonical).collect(),
                rets: func.rets.iter().map(Type::canonical).collect(),
            }),
            Type::Service(methods) => {
                let mut methods: Vec<Method> = methods
                    .iter()
                    .map(|m| Method { name: m.name.clone(), ty: m.ty.canonical() })
                    .collect();
                methods.sort_by(|a, b| a.name.cmp(&b.name));
                Type::Service(methods)
            }
            other => other.clone(),
        }
    }
}

fn canonical_fields(fields: &[Field]) -> Vec<Field> {
    let mut out: Vec<Field> = fields
        .iter()
        .map(|f| Field { label: f.label.clone(), ty: f.ty.canonical() })
        .collect();
    out.sort_by_key(|f| f.label.id());
    out
}

/// Returns the fields ordered by ascending hash.
///
/// # Errors
/// Returns `Error::HashCollision` if two labels share a hash.
pub fn sorted_fields(fields: &[Field]) -> Result<Vec<&Field>> {
    let mut sorted: Vec<&Field> = fields.iter().collect();
    sorted.sort_by_key(|f| f.label.id());
    for pair in sorted.windows(2) {
        if pair[0].label.id() == pair[1].label.id() {
            return Err(Error::HashCollision {
                hash: pair[0].label.id(),
                first: pair[0].label.to_string(),
                second: pair[1].label.to_string(),
            });
        }
    }
    Ok(sorted)
}

/// Named type definitions that `Type::Var` resolves against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeEnv(BTreeMap<String, Type>);

impl TypeEnv {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Defines `name`, returning the previous definition if any.
    pub fn insert(&mut self, name: impl Into<String>, ty: Type) -> Option<Type> {
        self.0.insert(name.into(), ty)
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.0.iter()
    }

    /// Follows `Var` aliases until a non-`Var` type is reached.
    ///
    /// # Errors
    /// Returns `Error::UnboundType` for an undefined name and
    /// `Error::Malformed` for an alias cycle (`type A = B; type B = A`).
    pub fn resolve<'t>(&'t self, mut ty: &'t Type) -> Result<&'t Type> {
        let mut hops = 0;
        while let Type::Var(name) = ty {
            ty = self.0.get(name).ok_or_else(|| Error::UnboundType(name.clone()))?;
            hops += 1;
            if hops > self.0.len() {
                return Err(Error::Malformed(format!("type alias cycle through {}", name)));
            }
        }
        Ok(ty)
    }

    /// Resolves `ty` and requires it to be a function type.
    pub fn as_func<'t>(&'t self, ty: &'t Type) -> Result<&'t FuncType> {
        match self.resolve(ty)? {
            Type::Func(func) => Ok(func),
            other => Err(Error::mismatch("func", other)),
        }
    }

    /// Looks up a method of a service type by name.
    pub fn method<'t>(&'t self, service: &'t Type, name: &str) -> Result<Option<&'t FuncType>> {
        let Type::Service(methods) = self.resolve(service)? else {
            return Err(Error::mismatch("service", service));
        };
        match methods.iter().find(|m| m.name == name) {
            Some(method) => Ok(Some(self.as_func(&method.ty)?)),
            None => Ok(None),
        }
    }
}

impl FromIterator<(String, Type)> for TypeEnv {
    fn from_iter<I: IntoIterator<Item = (String, Type)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_hashes() {
        assert_eq!(idl_hash("foo"), 5097222);
        assert_eq!(idl_hash("bar"), 4895187);
        assert_eq!(idl_hash("ok"), 24860);
        assert_eq!(idl_hash("err"), 5048165);
        assert_eq!(idl_hash(""), 0);
    }

    #[test]
    fn labels_compare_by_hash() {
        assert_eq!(Label::from("foo"), Label::Id(5097222));
        assert_ne!(Label::from("foo"), Label::from("bar"));
        assert!(Label::from("bar") < Label::from("foo"));
    }

    #[test]
    fn opcodes_roundtrip() {
        for code in -24..=-1 {
            let op = Opcode::from_i64(code).unwrap();
            assert_eq!(op.code(), code);
            assert_eq!(op.primitive().is_none(), op.is_constructed());
        }
        assert_eq!(Opcode::from_i64(0), None);
        assert_eq!(Opcode::from_i64(-25), None);
    }

    #[test]
    fn canonical_forms_agree() {
        let a = Type::record([("y", Type::Blob), ("x", Type::Nat)]);
        let b = Type::record([(Label::Id(idl_hash("x")), Type::Nat), (Label::from("y"), Type::vec(Type::Nat8))]);
        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn sorted_fields_detects_collisions() {
        let fields = vec![Field::new("foo", Type::Nat), Field::new(5097222u32, Type::Text)];
        assert!(matches!(sorted_fields(&fields), Err(Error::HashCollision { hash: 5097222, .. })));

        let fields = vec![Field::new("foo", Type::Nat), Field::new("bar", Type::Text)];
        let sorted = sorted_fields(&fields).unwrap();
        assert_eq!(sorted[0].label, Label::from("bar"));
    }

    #[test]
    fn resolve_follows_aliases() {
        let mut env = TypeEnv::new();
        env.insert("A", Type::var("B"));
        env.insert("B", Type::Nat);
        assert_eq!(env.resolve(&Type::var("A")).unwrap(), &Type::Nat);
        assert_eq!(env.resolve(&Type::var("C")), Err(Error::UnboundType("C".into())));

        env.insert("B", Type::var("A"));
        assert!(matches!(env.resolve(&Type::var("A")), Err(Error::Malformed(_))));
    }
}
