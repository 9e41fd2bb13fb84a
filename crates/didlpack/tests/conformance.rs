use didlpack::*;
use pretty_assertions::assert_eq;

fn list_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.insert(
        "List",
        Type::opt(Type::record([("head", Type::Int), ("tail", Type::var("List"))])),
    );
    env
}

fn list_of(len: usize) -> Value {
    let mut list = Value::none();
    for i in (0..len).rev() {
        list = Value::some(Value::record([("head", Value::int(i as i64)), ("tail", list)]));
    }
    list
}

// ============================================================================
//  STRUCTURAL SUBTYPING
// ============================================================================

#[test]
fn test_record_extra_field_is_dropped() -> Result<()> {
    let wide = Type::record([("x", Type::Nat), ("y", Type::opt(Type::Nat))]);
    let narrow = Type::record([("x", Type::Nat)]);

    let value = Value::record([("x", Value::nat(1u32)), ("y", Value::some(Value::nat(1u32)))]);
    let bytes = encode(&[value], &[wide])?;

    let decoded = decode_args(&bytes, &[narrow])?;
    assert_eq!(decoded, vec![Value::record([("x", Value::nat(1u32))])]);
    Ok(())
}

#[test]
fn test_record_missing_opt_field_is_none() -> Result<()> {
    let wide = Type::record([("x", Type::Nat), ("y", Type::opt(Type::Nat))]);
    let narrow = Type::record([("x", Type::Nat)]);

    let bytes = encode(&[Value::record([("x", Value::nat(1u32))])], &[narrow])?;
    let mut decoded = decode_args(&bytes, &[wide])?;

    let mut record = decoded.remove(0);
    assert_eq!(record.take_field::<num_bigint::BigUint>("x")?, num_bigint::BigUint::from(1u32));
    assert_eq!(record.take_field::<Option<num_bigint::BigUint>>("y")?, None);
    Ok(())
}

#[test]
fn test_record_missing_required_field() -> Result<()> {
    let bytes = encode(&[Value::record([("x", Value::nat(1u32))])], &[Type::record([("x", Type::Nat)])])?;
    let target = Type::record([("x", Type::Nat), ("z", Type::Text)]);
    assert_eq!(decode_args(&bytes, &[target]), Err(Error::MissingField(Label::from("z"))));
    Ok(())
}

#[test]
fn test_named_labels_survive_reconciliation() -> Result<()> {
    let ty = Type::record([("owner", Type::Principal), ("subaccount", Type::opt(Type::Blob))]);
    let value = Value::record([
        ("owner", Value::Principal(Principal::anonymous())),
        ("subaccount", Value::none()),
    ]);
    let bytes = encode(&[value], &[ty.clone()])?;
    let decoded = decode_args(&bytes, &[ty])?;
    let Value::Record(fields) = &decoded[0] else {
        panic!("expected a record");
    };
    assert!(matches!(&fields[0].label, Label::Named(name) if name == "owner"));
    Ok(())
}

#[test]
fn test_target_hash_collisions_fail() -> Result<()> {
    let bytes = encode(&[Value::record([("foo", Value::nat(1u32))])], &[Type::record([("foo", Type::Nat)])])?;
    let target = Type::record([(Label::from("foo"), Type::Nat), (Label::Id(5097222), Type::opt(Type::Text))]);
    assert!(matches!(decode_args(&bytes, &[target]), Err(Error::HashCollision { hash: 5097222, .. })));

    let bytes = encode(&[Value::variant("foo", Value::Null)], &[Type::variant([("foo", Type::Null)])])?;
    let target = Type::variant([(Label::from("foo"), Type::Null), (Label::Id(5097222), Type::Text)]);
    assert!(matches!(decode_args(&bytes, &[target]), Err(Error::HashCollision { hash: 5097222, .. })));
    Ok(())
}

#[test]
fn test_wire_types_are_checked_without_values() -> Result<()> {
    let bytes = encode(&[Value::Vec(vec![])], &[Type::vec(Type::Nat16)])?;
    assert!(matches!(decode_args(&bytes, &[Type::vec(Type::Nat32)]), Err(Error::TypeMismatch { .. })));
    assert_eq!(decode_args(&bytes, &[Type::vec(Type::Nat16)])?, vec![Value::Vec(vec![])]);

    let bytes = encode(&[Value::none()], &[Type::opt(Type::Text)])?;
    assert!(matches!(decode_args(&bytes, &[Type::opt(Type::Nat)]), Err(Error::TypeMismatch { .. })));

    let wire = Type::record([("tags", Type::vec(Type::Text))]);
    let bytes = encode(&[Value::record([("tags", Value::Vec(vec![]))])], &[wire])?;
    let target = Type::record([("tags", Type::vec(Type::Principal))]);
    assert!(matches!(decode_args(&bytes, &[target]), Err(Error::TypeMismatch { .. })));

    // nat may still fill a fixed width, and vec nat a blob.
    let bytes = encode(&[Value::Vec(vec![])], &[Type::vec(Type::Nat)])?;
    assert_eq!(decode_args(&bytes, &[Type::Blob])?, vec![Value::Blob(vec![])]);
    Ok(())
}

#[test]
fn test_variant_unknown_case_fails() -> Result<()> {
    let wire = Type::variant([("ok", Type::Null), ("err", Type::Text)]);
    let target = Type::variant([("ok", Type::Null)]);
    let bytes = encode(&[Value::variant("err", Value::text("oops..."))], &[wire.clone()])?;

    assert_eq!(decode_args(&bytes, &[target]), Err(Error::UnknownVariant(idl_hash("err"))));

    let bytes = encode(&[Value::variant("ok", Value::Null)], &[wire])?;
    let target = Type::variant([("ok", Type::Null), ("pending", Type::Nat)]);
    assert_eq!(decode_args(&bytes, &[target])?, vec![Value::variant("ok", Value::Null)]);
    Ok(())
}

#[test]
fn test_option_is_literal() -> Result<()> {
    let bytes = encode(&[Value::some(Value::nat(1u32))], &[Type::opt(Type::Nat)])?;
    assert!(matches!(decode_args(&bytes, &[Type::Nat]), Err(Error::TypeMismatch { .. })));

    let bytes = encode(&[Value::nat(1u32)], &[Type::Nat])?;
    assert!(matches!(decode_args(&bytes, &[Type::opt(Type::Nat)]), Err(Error::TypeMismatch { .. })));
    Ok(())
}

#[test]
fn test_fixed_width_integers_must_match() -> Result<()> {
    let bytes = encode(&[Value::Nat16(7)], &[Type::Nat16])?;
    assert!(matches!(decode_args(&bytes, &[Type::Nat32]), Err(Error::TypeMismatch { .. })));
    assert!(matches!(decode_args(&bytes, &[Type::Nat8]), Err(Error::TypeMismatch { .. })));

    let bytes = encode(&[Value::nat(7u32)], &[Type::Nat])?;
    assert_eq!(decode_args(&bytes, &[Type::Nat64])?, vec![Value::Nat64(7)]);
    assert!(matches!(decode_args(&bytes, &[Type::Int64]), Err(Error::TypeMismatch { .. })));
    Ok(())
}

#[test]
fn test_argument_list_evolution() -> Result<()> {
    let bytes = encode(&[Value::nat(1u32), Value::text("new")], &[Type::Nat, Type::Text])?;
    assert_eq!(decode_args(&bytes, &[Type::Nat])?, vec![Value::nat(1u32)]);

    let bytes = encode(&[Value::nat(1u32)], &[Type::Nat])?;
    assert_eq!(
        decode_args(&bytes, &[Type::Nat, Type::opt(Type::Text)])?,
        vec![Value::nat(1u32), Value::none()]
    );
    Ok(())
}

// ============================================================================
//  EMPTY VS ABSENT
// ============================================================================

#[test]
fn test_empty_vector_is_not_absent() -> Result<()> {
    let present = Type::record([("items", Type::vec(Type::Nat))]);
    let optional = Type::record([("items", Type::opt(Type::vec(Type::Nat)))]);

    let bytes = encode(&[Value::record([("items", Value::Vec(vec![]))])], &[present.clone()])?;
    let mut decoded = decode_args(&bytes, &[present])?.remove(0);
    let items: Option<Vec<num_bigint::BigUint>> = Some(decoded.take_field("items")?);
    assert_eq!(items, Some(vec![]));

    let bytes = encode(&[Value::record(Vec::<(Label, Value)>::new())], &[Type::record(Vec::<(Label, Type)>::new())])?;
    let mut decoded = decode_args(&bytes, &[optional.clone()])?.remove(0);
    assert_eq!(decoded.field("items"), Some(&Value::none()));
    let items: Option<Vec<num_bigint::BigUint>> = decoded.take_field("items")?;
    assert_eq!(items, None);

    let bytes = encode(&[Value::record([("items", Value::some(Value::Vec(vec![])))])], &[optional.clone()])?;
    let decoded = decode_args(&bytes, &[optional])?;
    assert_eq!(decoded[0].field("items"), Some(&Value::some(Value::Vec(vec![]))));
    Ok(())
}

#[test]
fn test_empty_blob_is_not_absent() -> Result<()> {
    let bytes = encode(&[Value::Blob(vec![])], &[Type::Blob])?;
    let blob: Vec<u8> = decode(&bytes)?.remove(0).into_rust()?;
    assert!(blob.is_empty());

    let bytes = encode(&[Value::none()], &[Type::opt(Type::Blob)])?;
    let blob: Option<Vec<u8>> = decode(&bytes)?.remove(0).into_rust()?;
    assert_eq!(blob, None);
    Ok(())
}

// ============================================================================
//  RECURSIVE TYPES
// ============================================================================

#[test]
fn test_recursive_list_tables_once() -> Result<()> {
    let env = list_env();
    let bytes = encode_with_env(&env, &[list_of(2)], &[Type::var("List")])?;
    let message = Decoder::new(&bytes).decode_message()?;
    // opt and record, nothing more.
    assert_eq!(message.env.len(), 2);
    Ok(())
}

#[test]
fn test_recursive_list_five_hundred_deep() -> Result<()> {
    let env = list_env();
    let list = list_of(500);
    let bytes = encode_with_env(&env, &[list.clone()], &[Type::var("List")])?;
    assert_eq!(decode_args_with_env(&bytes, &env, &[Type::var("List")])?, vec![list.clone()]);

    // Decoding against the wire table alone works too.
    let inferred = decode(&bytes)?;
    assert_eq!(render_args(&inferred).matches("opt record").count(), 500);
    Ok(())
}

#[test]
fn test_deep_recursion_with_raised_limit() -> Result<()> {
    let env = list_env();
    let list = list_of(1500);
    let bytes = encode_with_env(&env, &[list.clone()], &[Type::var("List")])?;

    assert_eq!(decode(&bytes), Err(Error::RecursionLimitExceeded));

    let config = DecoderConfig::default().max_depth(4_000);
    let decoded = Decoder::with_config(&bytes, config).decode_args(&env, &[Type::var("List")])?;
    assert_eq!(decoded, vec![list]);
    Ok(())
}

#[test]
fn test_mutually_recursive_types() -> Result<()> {
    let mut env = TypeEnv::new();
    env.insert("Tree", Type::record([("value", Type::Nat), ("forest", Type::var("Forest"))]));
    env.insert("Forest", Type::vec(Type::var("Tree")));

    let leaf = |n: u32| Value::record([("value", Value::nat(n)), ("forest", Value::Vec(vec![]))]);
    let tree = Value::record([("value", Value::nat(0u32)), ("forest", Value::Vec(vec![leaf(1), leaf(2)]))]);

    let bytes = encode_with_env(&env, &[tree.clone()], &[Type::var("Tree")])?;
    assert_eq!(Decoder::new(&bytes).decode_message()?.env.len(), 2);
    assert_eq!(decode_args_with_env(&bytes, &env, &[Type::var("Tree")])?, vec![tree]);
    Ok(())
}

// ============================================================================
//  PROPERTIES
// ============================================================================

mod properties {
    use super::*;
    use num_bigint::BigInt;
    use num_bigint::BigUint;
    use proptest::prelude::*;

    fn roundtrip(value: Value, ty: Type) -> Result<Value> {
        let bytes = encode(&[value], &[ty.clone()])?;
        Ok(decode_args(&bytes, &[ty])?.remove(0))
    }

    proptest! {
        #[test]
        fn leb128_unsigned(n in any::<u128>(), m in any::<u64>()) {
            let n = (BigUint::from(n) << 64u32) + m;
            let mut buf = Vec::new();
            leb128::encode_unsigned(&mut buf, &n);
            let mut cursor = Cursor::new(&buf);
            prop_assert_eq!(leb128::decode_unsigned(&mut cursor)?, n);
            prop_assert!(cursor.is_empty());
            prop_assert!(buf.len() == 1 || buf.last() != Some(&0), "shortest form");
        }

        #[test]
        fn leb128_signed(n in any::<i128>(), m in any::<u64>()) {
            let n = (BigInt::from(n) << 64u32) + m;
            let mut buf = Vec::new();
            leb128::encode_signed(&mut buf, &n);
            let mut cursor = Cursor::new(&buf);
            prop_assert_eq!(leb128::decode_signed(&mut cursor)?, n);
            prop_assert!(cursor.is_empty());
        }

        #[test]
        fn nat_and_int(n in any::<u128>(), i in any::<i128>()) {
            prop_assert_eq!(roundtrip(Value::nat(n), Type::Nat)?, Value::nat(n));
            prop_assert_eq!(roundtrip(Value::int(i), Type::Int)?, Value::int(i));
        }

        #[test]
        fn text(s in ".*") {
            prop_assert_eq!(roundtrip(Value::text(s.clone()), Type::Text)?, Value::text(s));
        }

        #[test]
        fn account_record(owner in proptest::collection::vec(any::<u8>(), 0..=29),
                          sub in proptest::option::of(proptest::collection::vec(any::<u8>(), 32)),
                          amount in any::<u64>(),
                          memo in proptest::option::of(any::<i32>())) {
            let ty = Type::record([
                ("owner", Type::Principal),
                ("subaccount", Type::opt(Type::Blob)),
                ("amount", Type::Nat64),
                ("memo", Type::opt(Type::Int32)),
            ]);
            let value = Value::record([
                ("owner", Value::Principal(Principal::from_slice(&owner)?)),
                ("subaccount", Value::from(sub.map(Value::Blob))),
                ("amount", Value::Nat64(amount)),
                ("memo", Value::from(memo)),
            ]);
            prop_assert_eq!(roundtrip(value.clone(), ty)?, value);
        }

        #[test]
        fn vectors(items in proptest::collection::vec(any::<i16>(), 0..64)) {
            let value = Value::from(items);
            prop_assert_eq!(roundtrip(value.clone(), Type::vec(Type::Int16))?, value);
        }
    }
}
