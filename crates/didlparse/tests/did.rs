use didlpack::FuncMode;
use didlpack::FuncType;
use didlpack::Principal;
use didlpack::Type;
use didlpack::Value;
use didlparse::parse;
use didlparse::parse_args_typed;
use didlparse::parse_args_with_env;
use didlparse::parse_did;
use didlparse::parse_type;
use didlparse::Parsed;
use didlparse::Result;
use pretty_assertions::assert_eq;

const COUNTER: &str = include_str!("fixtures/counter.did");
const LEDGER: &str = include_str!("fixtures/ledger.did");

// ============================================================================
// INTERFACE DESCRIPTIONS
// ============================================================================

#[test]
fn test_counter() -> Result<()> {
    let did = parse_did(COUNTER)?;
    assert_eq!(did.method("inc"), Some(&FuncType::new(vec![], vec![Type::Nat])));
    assert_eq!(did.to_string(), "service : {\n  inc : () -> (nat);\n}");
    Ok(())
}

#[test]
fn test_ledger_methods() -> Result<()> {
    let did = parse_did(LEDGER)?;
    let service = did.service.as_ref().expect("service");
    assert_eq!(service.name.as_deref(), Some("ledger"));
    assert_eq!(service.init, vec![Type::var("InitArgs")]);
    assert_eq!(did.methods().len(), 11);

    let balance = did.method("icrc1_balance_of").expect("icrc1_balance_of");
    assert!(balance.is_query());
    assert_eq!(balance.args, vec![Type::var("Account")]);

    let transfer = did.method("icrc1_transfer").expect("icrc1_transfer");
    assert!(!transfer.is_query());

    let notify = did.method("notify").expect("notify");
    assert_eq!(notify.modes, vec![FuncMode::Oneway]);
    assert!(notify.rets.is_empty());

    assert_eq!(did.method("http_stats").map(|f| f.modes.clone()), Some(vec![FuncMode::CompositeQuery]));
    assert_eq!(did.method("missing"), None);
    Ok(())
}

#[test]
fn test_ledger_definitions() -> Result<()> {
    let did = parse_did(LEDGER)?;
    assert_eq!(did.env.get("Subaccount"), Some(&Type::Blob));
    assert_eq!(
        did.env.get("Account"),
        Some(&Type::record([
            ("owner", Type::Principal),
            ("subaccount", Type::opt(Type::var("Subaccount"))),
        ]))
    );
    let Some(Type::Variant(cases)) = did.env.get("TransferError") else {
        panic!("TransferError is a variant");
    };
    assert_eq!(cases.len(), 8);
    assert_eq!(cases[3].ty, Type::Null);
    Ok(())
}

#[test]
fn test_rendered_did_reparses() -> Result<()> {
    let did = parse_did(LEDGER)?;
    let again = parse_did(&did.to_string())?;
    assert_eq!(again, did);
    Ok(())
}

#[test]
fn test_ledger_call_arguments() -> Result<()> {
    let did = parse_did(LEDGER)?;
    let method = did.method("icrc1_balance_of").expect("icrc1_balance_of");
    let values = parse_args_typed(r#"(record { owner = principal "aaaaa-aa"; subaccount = opt blob "\00\01" })"#, &did.env, &method.args)?;
    let bytes = didlpack::encode_with_env(&did.env, &values, &method.args).expect("encode");
    let decoded = didlpack::decode_args_with_env(&bytes, &did.env, &method.args).expect("decode");
    assert_eq!(
        decoded,
        vec![Value::record([
            ("owner", Value::Principal(Principal::management())),
            ("subaccount", Value::some(Value::Blob(vec![0, 1]))),
        ])]
    );
    Ok(())
}

#[test]
fn test_recursive_definition() -> Result<()> {
    let did = parse_did("type List = opt record { head : int; tail : List };")?;
    let args = parse_args_with_env("(opt record { head = 1; tail = opt record { head = 2; tail = null } } : List)", &did.env)?;
    let bytes = args.encode().expect("encode");
    let decoded = didlpack::decode_args_with_env(&bytes, &did.env, &args.types).expect("decode");
    assert_eq!(decoded, args.values);
    Ok(())
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

#[test]
fn test_parse_dispatch() -> Result<()> {
    assert_eq!(parse("record { a : nat }")?, Parsed::Type(Type::record([("a", Type::Nat)])));
    assert!(matches!(parse("service : {}")?, Parsed::Prog(_)));
    assert!(matches!(parse("")?, Parsed::Prog(_)));
    assert!(matches!(parse("type A = nat;")?, Parsed::Prog(_)));
    assert_eq!(
        parse("service { m : () -> () }")?,
        Parsed::Type(Type::service([("m", Type::Func(FuncType::default()))]))
    );
    Ok(())
}

#[test]
fn test_deep_types() -> Result<()> {
    let source = format!("{}nat", "opt ".repeat(2000));
    let mut ty = parse_type(&source)?;
    let mut depth = 0;
    while let Type::Opt(inner) = ty {
        ty = *inner;
        depth += 1;
    }
    assert_eq!((depth, ty), (2000, Type::Nat));
    Ok(())
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_unbound_type() {
    let err = parse_did("type A = record {\n  b : B;\n};").unwrap_err();
    assert_eq!(err.message, "unbound type identifier B");
    assert_eq!((err.line, err.column), (2, 7));
}

#[test]
fn test_duplicate_definition() {
    let err = parse_did("type A = nat;\ntype A = text;").unwrap_err();
    assert_eq!(err.message, "duplicate type definition A");
    assert_eq!(err.line, 2);
}

#[test]
fn test_alias_cycle() {
    let err = parse_did("type A = B;\ntype B = A;").unwrap_err();
    assert!(err.message.contains("cycle"), "{}", err);
}

#[test]
fn test_method_must_be_a_function() {
    let err = parse_did("type T = nat;\nservice : { m : T }").unwrap_err();
    assert!(err.message.contains("expected func"), "{}", err);
    assert_eq!(err.line, 2);
}

#[test]
fn test_duplicate_method() {
    let err = parse_did("service : { m : () -> (); m : () -> () }").unwrap_err();
    assert_eq!(err.message, "duplicate method m");
}

#[test]
fn test_trailing_input_after_service() {
    let err = parse_did("service : {}; type A = nat;").unwrap_err();
    assert_eq!(err.message, "expected end of input, found `type`");
}

#[test]
fn test_primitive_names_are_reserved() {
    let err = parse_did("type nat = text;").unwrap_err();
    assert_eq!(err.message, "nat is a primitive type");
}
