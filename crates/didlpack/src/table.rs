//! # Type Definition Table
//!
//! The per-message arena of constructed types, addressed by index.
//!
//! ## Invariants
//! - **Structural Identity**: entries are memoized by canonical structure, so two
//!   independently built `record { x : nat }` types share one entry.
//! - **Recursion**: an entry's index is allocated *before* its children are
//!   visited; a child that recurses back finds the pre-allocated index.
//! - **Scope**: a table belongs to exactly one encode or decode call. Index
//!   assignment depends on traversal order, so tables are never shared.

use std::collections::HashMap;

use crate::cursor::Cursor;
use crate::error::Error;
use crate::error::Result;
use crate::leb128;
use crate::stack::ensure_sufficient_stack;
use crate::types::sorted_fields;
use crate::types::Field;
use crate::types::FuncMode;
use crate::types::FuncType;
use crate::types::Label;
use crate::types::Method;
use crate::types::Opcode;
use crate::types::Type;
use crate::types::TypeEnv;

/// Environment name given to wire table entry `index`.
pub fn table_name(index: usize) -> String {
    format!("table{}", index)
}

/// Builds the type table for an outgoing message.
#[derive(Debug)]
pub struct TypeTable<'e> {
    env: &'e TypeEnv,
    /// Encoded entries in index order. Empty while the entry's children are being visited.
    entries: Vec<Vec<u8>>,
    indexes: HashMap<Type, u32>,
}

impl<'e> TypeTable<'e> {
    pub fn new(env: &'e TypeEnv) -> Self {
        Self {
            env,
            entries: Vec::new(),
            indexes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tables `ty` and every constructed type reachable from it.
    ///
    /// On error the table is left as it was before the call.
    pub fn add_type_definition(&mut self, ty: &Type) -> Result<()> {
        let mark = self.entries.len();
        let result = self.add_child(ty);
        if result.is_err() {
            self.entries.truncate(mark);
            self.indexes.retain(|_, index| (*index as usize) < mark);
        }
        result
    }

    fn add_child(&mut self, ty: &Type) -> Result<()> {
        ensure_sufficient_stack(|| self.add(ty))
    }

    fn add(&mut self, ty: &Type) -> Result<()> {
        let env = self.env;
        let ty = env.resolve(ty)?;
        if ty.is_primitive() {
            return Ok(());
        }
        let key = ty.canonical();
        if self.indexes.contains_key(&key) {
            return Ok(());
        }

        let index = self.entries.len();
        let index_u32 = u32::try_from(index)
            .map_err(|_| Error::Malformed("type table exceeds u32 entries".into()))?;
        self.entries.push(Vec::new());
        self.indexes.insert(key.clone(), index_u32);

        match &key {
            Type::Opt(inner) | Type::Vec(inner) => self.add_child(inner)?,
            Type::Record(fields) | Type::Variant(fields) => {
                for field in fields {
                    self.add_child(&field.ty)?;
                }
            }
            Type::Func(func) => {
                for ty in func.args.iter().chain(&func.rets) {
                    self.add_child(ty)?;
                }
            }
            Type::Service(methods) => {
                for method in methods {
                    self.add_child(&method.ty)?;
                }
            }
            _ => {}
        }

        let entry = self.encode_entry(&key)?;
        tracing::trace!(index, bytes = entry.len(), "tabled {}", key);
        self.entries[index] = entry;
        Ok(())
    }

    fn encode_entry(&self, ty: &Type) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let op = ty.opcode().ok_or_else(|| Error::UnboundType(ty.to_string()))?;
        leb128::encode_i64(&mut buf, op.code());

        match ty {
            Type::Opt(inner) | Type::Vec(inner) => self.encode_type_ref(&mut buf, inner)?,
            Type::Record(fields) | Type::Variant(fields) => {
                let sorted = sorted_fields(fields)?;
                leb128::encode_u64(&mut buf, sorted.len() as u64);
                for field in sorted {
                    leb128::encode_u64(&mut buf, field.label.id() as u64);
                    self.encode_type_ref(&mut buf, &field.ty)?;
                }
            }
            Type::Func(func) => {
                leb128::encode_u64(&mut buf, func.args.len() as u64);
                for arg in &func.args {
                    self.encode_type_ref(&mut buf, arg)?;
                }
                leb128::encode_u64(&mut buf, func.rets.len() as u64);
                for ret in &func.rets {
                    self.encode_type_ref(&mut buf, ret)?;
                }
                leb128::encode_u64(&mut buf, func.modes.len() as u64);
                buf.extend(func.modes.iter().map(|m| m.byte()));
            }
            Type::Service(methods) => {
                // Canonical order is by name; equal neighbours are duplicates.
                for pair in methods.windows(2) {
                    if pair[0].name == pair[1].name {
                        return Err(Error::Malformed(format!("duplicate method {}", pair[0].name)));
                    }
                }
                leb128::encode_u64(&mut buf, methods.len() as u64);
                for method in methods {
                    self.env.as_func(&method.ty)?;
                    leb128::encode_u64(&mut buf, method.name.len() as u64);
                    buf.extend_from_slice(method.name.as_bytes());
                    self.encode_type_ref(&mut buf, &method.ty)?;
                }
            }
            other => return Err(Error::mismatch("constructed type", other)),
        }
        Ok(buf)
    }

    /// Writes a type reference: a primitive's opcode, or a table index.
    pub fn encode_type_ref(&self, buf: &mut Vec<u8>, ty: &Type) -> Result<()> {
        let ty = self.env.resolve(ty)?;
        if let Some(op) = ty.opcode().filter(|op| !op.is_constructed()) {
            leb128::encode_i64(buf, op.code());
            return Ok(());
        }
        let index = self
            .indexes
            .get(&ty.canonical())
            .ok_or_else(|| Error::Malformed(format!("type {} was never added to the table", ty)))?;
        leb128::encode_i64(buf, *index as i64);
        Ok(())
    }

    /// Writes the entry count followed by every entry in index order.
    pub fn write(&self, buf: &mut Vec<u8>) {
        leb128::encode_u64(buf, self.entries.len() as u64);
        for entry in &self.entries {
            buf.extend_from_slice(entry);
        }
    }
}

/// Reads a wire type table into an environment of `table0..tableN` entries.
///
/// Entries may reference any index, including later ones, so references are
/// materialized as `Type::Var` and resolved lazily through the environment.
pub fn read_table(cursor: &mut Cursor<'_>, max_entries: usize) -> Result<TypeEnv> {
    let len = leb128::decode_len(cursor)?;
    if len > max_entries {
        return Err(Error::Malformed(format!(
            "type table has {} entries, limit is {}",
            len, max_entries
        )));
    }

    let mut env = TypeEnv::new();
    for index in 0..len {
        let code = leb128::decode_i64(cursor)?;
        let op = Opcode::from_i64(code)
            .filter(|op| op.is_constructed())
            .ok_or(Error::UnknownOpcode(code))?;
        let ty = match op {
            Opcode::Opt => Type::opt(read_type_ref(cursor, len)?),
            Opcode::Vec => Type::vec(read_type_ref(cursor, len)?),
            Opcode::Record => Type::Record(read_fields(cursor, len)?),
            Opcode::Variant => Type::Variant(read_fields(cursor, len)?),
            Opcode::Func => Type::Func(read_func(cursor, len)?),
            Opcode::Service => Type::Service(read_methods(cursor, len)?),
            _ => return Err(Error::UnknownOpcode(code)),
        };
        env.insert(table_name(index), ty);
    }

    for (_, ty) in env.iter() {
        if let Type::Service(methods) = ty {
            for method in methods {
                env.as_func(&method.ty)?;
            }
        }
    }
    tracing::trace!(entries = len, "read type table");
    Ok(env)
}

/// Reads a type reference: negative is a primitive opcode, non-negative a table index.
pub fn read_type_ref(cursor: &mut Cursor<'_>, table_len: usize) -> Result<Type> {
    let code = leb128::decode_i64(cursor)?;
    if code >= 0 {
        return match usize::try_from(code) {
            Ok(index) if index < table_len => Ok(Type::Var(table_name(index))),
            _ => Err(Error::UnknownOpcode(code)),
        };
    }
    Opcode::from_i64(code)
        .and_then(Opcode::primitive)
        .ok_or(Error::UnknownOpcode(code))
}

fn read_fields(cursor: &mut Cursor<'_>, table_len: usize) -> Result<Vec<Field>> {
    let count = leb128::decode_len(cursor)?;
    let mut fields: Vec<Field> = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        let raw = leb128::decode_u64(cursor)?;
        let id = u32::try_from(raw)
            .map_err(|_| Error::Malformed(format!("field hash {} exceeds 32 bits", raw)))?;
        if let Some(prev) = fields.last() {
            let prev = prev.label.id();
            if id == prev {
                return Err(Error::HashCollision {
                    hash: id,
                    first: prev.to_string(),
                    second: id.to_string(),
                });
            }
            if id < prev {
                return Err(Error::Malformed(format!("field {} follows {}", id, prev)));
            }
        }
        let ty = read_type_ref(cursor, table_len)?;
        fields.push(Field { label: Label::Id(id), ty });
    }
    Ok(fields)
}

fn read_type_refs(cursor: &mut Cursor<'_>, table_len: usize) -> Result<Vec<Type>> {
    let count = leb128::decode_len(cursor)?;
    let mut types = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        types.push(read_type_ref(cursor, table_len)?);
    }
    Ok(types)
}

fn read_func(cursor: &mut Cursor<'_>, table_len: usize) -> Result<FuncType> {
    let args = read_type_refs(cursor, table_len)?;
    let rets = read_type_refs(cursor, table_len)?;
    let count = leb128::decode_len(cursor)?;
    let mut modes = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        let byte = cursor.read_byte()?;
        let mode = FuncMode::from_byte(byte)
            .ok_or_else(|| Error::Malformed(format!("unknown function annotation {}", byte)))?;
        modes.push(mode);
    }
    Ok(FuncType { modes, args, rets })
}

fn read_methods(cursor: &mut Cursor<'_>, table_len: usize) -> Result<Vec<Method>> {
    let count = leb128::decode_len(cursor)?;
    let mut methods: Vec<Method> = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        let len = leb128::decode_len(cursor)?;
        let name = std::str::from_utf8(cursor.read_bytes(len)?).map_err(|_| Error::InvalidUtf8)?;
        if let Some(prev) = methods.last() {
            if prev.name.as_str() >= name {
                return Err(Error::Malformed(format!("method {} follows {}", name, prev.name)));
            }
        }
        let ty = read_type_ref(cursor, table_len)?;
        methods.push(Method { name: name.to_string(), ty });
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_bytes(env: &TypeEnv, types: &[Type]) -> Result<Vec<u8>> {
        let mut table = TypeTable::new(env);
        for ty in types {
            table.add_type_definition(ty)?;
        }
        let mut buf = Vec::new();
        table.write(&mut buf);
        Ok(buf)
    }

    #[test]
    fn primitives_are_not_tabled() -> Result<()> {
        let env = TypeEnv::new();
        assert_eq!(table_bytes(&env, &[Type::Nat, Type::Text, Type::Principal])?, [0x00]);
        Ok(())
    }

    #[test]
    fn structural_types_share_one_entry() -> Result<()> {
        let env = TypeEnv::new();
        let a = Type::record([("x", Type::Nat)]);
        let b = Type::record([("x", Type::Nat)]);
        let bytes = table_bytes(&env, &[a, Type::opt(b)])?;
        // record { x : nat } then opt table0
        assert_eq!(bytes, [0x02, 0x6c, 0x01, 0x78, 0x7d, 0x6e, 0x00]);
        Ok(())
    }

    #[test]
    fn blob_and_vec_nat8_are_the_same_entry() -> Result<()> {
        let env = TypeEnv::new();
        let bytes = table_bytes(&env, &[Type::Blob, Type::vec(Type::Nat8)])?;
        assert_eq!(bytes, [0x01, 0x6d, 0x7b]);
        Ok(())
    }

    #[test]
    fn recursive_type_points_back() -> Result<()> {
        let mut env = TypeEnv::new();
        env.insert("List", Type::opt(Type::record([("head", Type::Nat), ("tail", Type::var("List"))])));
        let mut table = TypeTable::new(&env);
        table.add_type_definition(&Type::var("List"))?;
        assert_eq!(table.len(), 2);

        let mut buf = Vec::new();
        table.write(&mut buf);
        let mut cursor = Cursor::new(&buf);
        let wire = read_table(&mut cursor, 16)?;
        assert!(cursor.is_empty());

        // table0 = opt table1, table1 = record { head : nat; tail : table0 }
        assert_eq!(wire.get("table0"), Some(&Type::opt(Type::var("table1"))));
        let Some(Type::Record(fields)) = wire.get("table1") else {
            panic!("expected a record entry");
        };
        assert!(fields.iter().any(|f| f.ty == Type::var("table0")));
        Ok(())
    }

    #[test]
    fn failed_definition_leaves_table_untouched() -> Result<()> {
        let env = TypeEnv::new();
        let mut table = TypeTable::new(&env);
        table.add_type_definition(&Type::vec(Type::Nat))?;
        let colliding = Type::opt(Type::record([(Label::from("foo"), Type::Nat), (Label::Id(5097222), Type::Text)]));
        assert!(table.add_type_definition(&colliding).is_err());
        assert_eq!(table.len(), 1);
        // The placeholder for `opt` is gone, so a fresh type reuses index 1.
        table.add_type_definition(&Type::opt(Type::Nat))?;
        let mut buf = Vec::new();
        table.encode_type_ref(&mut buf, &Type::opt(Type::Nat))?;
        assert_eq!(buf, [0x01]);
        Ok(())
    }

    #[test]
    fn type_ref_rejects_out_of_range_index() {
        let mut cursor = Cursor::new(&[0x02]);
        assert_eq!(read_type_ref(&mut cursor, 2), Err(Error::UnknownOpcode(2)));
        // A constructed opcode is never a valid reference.
        let mut cursor = Cursor::new(&[0x6c]);
        assert_eq!(read_type_ref(&mut cursor, 2), Err(Error::UnknownOpcode(-20)));
    }

    #[test]
    fn table_rejects_unsorted_and_duplicate_fields() {
        let unsorted = [0x01, 0x6c, 0x02, 0x02, 0x7d, 0x01, 0x7d];
        assert!(matches!(read_table(&mut Cursor::new(&unsorted), 16), Err(Error::Malformed(_))));
        let duplicate = [0x01, 0x6c, 0x02, 0x01, 0x7d, 0x01, 0x7d];
        assert!(matches!(
            read_table(&mut Cursor::new(&duplicate), 16),
            Err(Error::HashCollision { hash: 1, .. })
        ));
    }

    #[test]
    fn table_rejects_primitive_entries_and_oversize() {
        assert_eq!(read_table(&mut Cursor::new(&[0x01, 0x7d]), 16), Err(Error::UnknownOpcode(-3)));
        assert!(matches!(read_table(&mut Cursor::new(&[0x05]), 4), Err(Error::Malformed(_))));
    }

    #[test]
    fn service_entry_requires_functions() -> Result<()> {
        let env = TypeEnv::new();
        let service = Type::service([
            ("inc", Type::func(FuncType::new(vec![], vec![Type::Nat]))),
            ("get", Type::func(FuncType::new(vec![], vec![Type::Nat]).with_mode(FuncMode::Query))),
        ]);
        let bytes = table_bytes(&env, &[service])?;
        let wire = read_table(&mut Cursor::new(&bytes), 16)?;
        let service = wire.get(&table_name(0)).unwrap().clone();
        let get = wire.method(&service, "get")?.unwrap();
        assert!(get.is_query());
        assert!(wire.method(&service, "missing")?.is_none());

        let bad = Type::service([("inc", Type::Nat)]);
        assert!(matches!(table_bytes(&env, &[bad]), Err(Error::TypeMismatch { .. })));
        Ok(())
    }
}
