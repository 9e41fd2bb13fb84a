//! # Value Text
//!
//! Parses Candid value syntax such as `(record { foo = "baz"; bar = 42 })`.
//!
//! Values are first read into an untyped tree, then either given inferred
//! types or checked against expected ones:
//!
//! - unannotated integers are `int`, decimals are `float64`
//! - `vec {}` is `vec null`, `opt null` is an absent `opt null`
//! - a bare variant case carries `null`
//! - `(v : T)` checks `v` against `T`, which is how `nat`, `nat8`, ... are written

use std::fmt;

use didlpack::ensure_sufficient_stack;
use didlpack::reconcile;
use didlpack::render_args;
use didlpack::FieldValue;
use didlpack::Field;
use didlpack::FuncType;
use didlpack::Label;
use didlpack::Principal;
use didlpack::Type;
use didlpack::TypeEnv;
use didlpack::Value;
use logos::Span;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::trace;

use crate::error::ParseError;
use crate::error::Result;
use crate::parser::Parser;
use crate::token::Token;

#[derive(Debug, Clone)]
struct Expr {
    kind: ExprKind,
    span: Span,
}

#[derive(Debug, Clone)]
enum ExprKind {
    Null,
    Bool(bool),
    Number(BigInt),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Principal(Principal),
    Service(Principal),
    Func(Principal, String),
    Opt(Box<Expr>),
    Vec(Vec<Expr>),
    Record(Vec<(Label, Expr)>),
    Variant(Label, Box<Expr>),
    Annotated(Box<Expr>, Type),
}

impl ExprKind {
    fn describe(&self) -> &'static str {
        match self {
            ExprKind::Null => "null",
            ExprKind::Bool(_) => "a bool",
            ExprKind::Number(_) => "a number",
            ExprKind::Float(_) => "a float",
            ExprKind::Text(_) => "text",
            ExprKind::Blob(_) => "a blob",
            ExprKind::Principal(_) => "a principal",
            ExprKind::Service(_) => "a service",
            ExprKind::Func(..) => "a func",
            ExprKind::Opt(_) => "an opt",
            ExprKind::Vec(_) => "a vec",
            ExprKind::Record(_) => "a record",
            ExprKind::Variant(..) => "a variant",
            ExprKind::Annotated(..) => "an annotated value",
        }
    }
}

/// Parsed arguments with the types they were inferred or annotated with.
#[derive(Debug, Clone, PartialEq)]
pub struct IdlArgs {
    pub env: TypeEnv,
    pub types: Vec<Type>,
    pub values: Vec<Value>,
}

impl IdlArgs {
    /// Encodes the arguments as a `DIDL` message.
    pub fn encode(&self) -> didlpack::Result<Vec<u8>> {
        didlpack::encode_with_env(&self.env, &self.values, &self.types)
    }
}

impl fmt::Display for IdlArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_args(&self.values))
    }
}

// ===== Grammar =====

impl Parser<'_> {
    fn parse_expr(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| {
            let start = self.span().start;
            let kind = self.parse_expr_kind()?;
            Ok(Expr { kind, span: start..self.last_end() })
        })
    }

    fn parse_expr_kind(&mut self) -> Result<ExprKind> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("a value"));
        };
        match token {
            Token::Null => {
                self.bump();
                Ok(ExprKind::Null)
            }
            Token::True | Token::False => {
                self.bump();
                Ok(ExprKind::Bool(token == Token::True))
            }
            Token::Plus | Token::Minus | Token::Decimal | Token::Hex | Token::Float => self.parse_number(),
            Token::Text => self.text().map(|(text, _)| ExprKind::Text(text)),
            Token::Blob => {
                self.bump();
                self.text_bytes().map(|(bytes, _)| ExprKind::Blob(bytes))
            }
            Token::Principal => {
                self.bump();
                self.principal().map(ExprKind::Principal)
            }
            Token::Service => {
                self.bump();
                self.principal().map(ExprKind::Service)
            }
            Token::Func => {
                self.bump();
                let service = self.principal()?;
                self.expect(Token::Dot)?;
                let (method, _) = self.name()?;
                Ok(ExprKind::Func(service, method))
            }
            Token::Opt => {
                self.bump();
                Ok(ExprKind::Opt(Box::new(self.parse_expr()?)))
            }
            Token::Vec => {
                self.bump();
                self.expect(Token::LBrace)?;
                let mut items = Vec::new();
                while !self.eat(Token::RBrace) {
                    items.push(self.parse_expr()?);
                    if !self.eat(Token::Semi) {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                Ok(ExprKind::Vec(items))
            }
            Token::Record => {
                self.bump();
                self.parse_record().map(ExprKind::Record)
            }
            Token::Variant => {
                self.bump();
                self.expect(Token::LBrace)?;
                let label = self.label()?;
                let payload = if self.eat(Token::Equals) {
                    self.parse_expr()?
                } else {
                    let at = self.last_end();
                    Expr { kind: ExprKind::Null, span: at..at }
                };
                self.eat(Token::Semi);
                self.expect(Token::RBrace)?;
                Ok(ExprKind::Variant(label, Box::new(payload)))
            }
            Token::LParen => {
                self.bump();
                let expr = self.parse_annotated()?;
                self.expect(Token::RParen)?;
                Ok(expr.kind)
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// `value (: type)?`
    fn parse_annotated(&mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        if !self.eat(Token::Colon) {
            return Ok(expr);
        }
        let ty = self.parse_type()?;
        let span = expr.span.start..self.last_end();
        Ok(Expr { kind: ExprKind::Annotated(Box::new(expr), ty), span })
    }

    fn parse_number(&mut self) -> Result<ExprKind> {
        let negative = match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                true
            }
            Some(Token::Plus) => {
                self.bump();
                false
            }
            _ => false,
        };
        let token = self.peek();
        let span = self.span();
        let digits = self.slice(&span).replace('_', "");
        let kind = match token {
            Some(Token::Decimal) => BigInt::parse_bytes(digits.as_bytes(), 10).map(ExprKind::Number),
            Some(Token::Hex) => BigInt::parse_bytes(digits[2..].as_bytes(), 16).map(ExprKind::Number),
            Some(Token::Float) => digits.parse::<f64>().ok().map(ExprKind::Float),
            _ => return Err(self.unexpected("a number")),
        };
        let Some(kind) = kind else {
            return Err(self.error_at(span, "invalid number literal"));
        };
        self.bump();
        Ok(match kind {
            ExprKind::Number(n) if negative => ExprKind::Number(-n),
            ExprKind::Float(x) if negative => ExprKind::Float(-x),
            other => other,
        })
    }

    fn principal(&mut self) -> Result<Principal> {
        let (text, span) = self.text()?;
        Principal::from_text(&text).map_err(|err| self.error_at(span, err.to_string()))
    }

    fn parse_record(&mut self) -> Result<Vec<(Label, Expr)>> {
        self.expect(Token::LBrace)?;
        let mut fields: Vec<(Label, Expr)> = Vec::new();
        let mut next_position = 0u32;
        while !self.eat(Token::RBrace) {
            let start = self.span().start;
            let label = if self.at_label_then(Token::Equals) {
                let label = self.label()?;
                self.bump();
                label
            } else {
                Label::Unnamed(next_position)
            };
            let value = self.parse_expr()?;
            if fields.iter().any(|(l, _)| *l == label) {
                return Err(self.error_at(start..self.last_end(), format!("duplicate field {}", label)));
            }
            next_position = label.id().wrapping_add(1);
            fields.push((label, value));
            if !self.eat(Token::Semi) {
                self.expect(Token::RBrace)?;
                break;
            }
        }
        Ok(fields)
    }

    /// `( arg, ... )` or a single bare argument.
    fn parse_arg_exprs(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(Token::LParen) {
            self.bump();
            while !self.eat(Token::RParen) {
                args.push(self.parse_annotated()?);
                if !self.eat(Token::Comma) {
                    self.expect(Token::RParen)?;
                    break;
                }
            }
        } else if !self.at_end() {
            args.push(self.parse_annotated()?);
        }
        self.expect_end()?;
        Ok(args)
    }
}

// ===== Typing =====

struct Checker<'a> {
    source: &'a str,
    env: &'a TypeEnv,
}

impl Checker<'_> {
    fn error(&self, span: &Span, message: impl Into<String>) -> ParseError {
        ParseError::at(self.source, span.clone(), message)
    }

    fn resolve<'t>(&'t self, ty: &'t Type, span: &Span) -> Result<&'t Type> {
        self.env.resolve(ty).map_err(|err| self.error(span, err.to_string()))
    }

    fn infer(&self, expr: Expr) -> Result<(Value, Type)> {
        ensure_sufficient_stack(|| self.infer_inner(expr))
    }

    fn infer_inner(&self, expr: Expr) -> Result<(Value, Type)> {
        Ok(match expr.kind {
            ExprKind::Null => (Value::Null, Type::Null),
            ExprKind::Bool(b) => (Value::Bool(b), Type::Bool),
            ExprKind::Number(n) => (Value::Int(n), Type::Int),
            ExprKind::Float(x) => (Value::Float64(x), Type::Float64),
            ExprKind::Text(s) => (Value::Text(s), Type::Text),
            ExprKind::Blob(bytes) => (Value::Blob(bytes), Type::Blob),
            ExprKind::Principal(p) => (Value::Principal(p), Type::Principal),
            ExprKind::Service(p) => (Value::Service(p), Type::Service(Vec::new())),
            ExprKind::Func(p, method) => (Value::Func(p, method), Type::Func(FuncType::default())),
            ExprKind::Opt(inner) if matches!(inner.kind, ExprKind::Null) => {
                (Value::none(), Type::opt(Type::Null))
            }
            ExprKind::Opt(inner) => {
                let (value, ty) = self.infer(*inner)?;
                (Value::some(value), Type::opt(ty))
            }
            ExprKind::Vec(items) => {
                let mut values = Vec::with_capacity(items.len());
                let mut elem: Option<Type> = None;
                for item in items {
                    let item_span = item.span.clone();
                    let (value, ty) = self.infer(item)?;
                    match &elem {
                        Some(first) if *first != ty => {
                            let message = format!("vector elements disagree: {} and {}", first, ty);
                            return Err(self.error(&item_span, message));
                        }
                        Some(_) => {}
                        None => elem = Some(ty),
                    }
                    values.push(value);
                }
                (Value::Vec(values), Type::vec(elem.unwrap_or(Type::Null)))
            }
            ExprKind::Record(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                let mut types = Vec::with_capacity(fields.len());
                for (label, expr) in fields {
                    let (value, ty) = self.infer(expr)?;
                    values.push(FieldValue { label: label.clone(), value });
                    types.push(Field { label, ty });
                }
                (Value::Record(values), Type::Record(types))
            }
            ExprKind::Variant(label, payload) => {
                let (value, ty) = self.infer(*payload)?;
                (
                    Value::Variant(Box::new(FieldValue { label: label.clone(), value })),
                    Type::Variant(vec![Field { label, ty }]),
                )
            }
            ExprKind::Annotated(inner, ty) => {
                let value = self.check(*inner, &ty)?;
                (value, ty)
            }
        })
    }

    fn check(&self, expr: Expr, ty: &Type) -> Result<Value> {
        ensure_sufficient_stack(|| self.check_inner(expr, ty))
    }

    fn check_inner(&self, expr: Expr, ty: &Type) -> Result<Value> {
        let span = expr.span;
        let target = self.resolve(ty, &span)?;
        if *target == Type::Reserved {
            return Ok(Value::Reserved);
        }
        let mismatch = |kind: &ExprKind| self.error(&span, format!("expected {}, found {}", ty, kind.describe()));
        Ok(match (expr.kind, target) {
            (ExprKind::Null, Type::Null) => Value::Null,
            (ExprKind::Null, Type::Opt(_)) => Value::none(),
            (ExprKind::Bool(b), Type::Bool) => Value::Bool(b),
            (ExprKind::Number(n), target) => self.number(n, target, &span)?,
            (ExprKind::Float(x), Type::Float32) => Value::Float32(x as f32),
            (ExprKind::Float(x), Type::Float64) => Value::Float64(x),
            (ExprKind::Text(s), Type::Text) => Value::Text(s),
            (ExprKind::Blob(bytes), Type::Blob) => Value::Blob(bytes),
            (ExprKind::Blob(bytes), Type::Vec(elem)) if matches!(self.env.resolve(elem), Ok(Type::Nat8)) => {
                Value::Blob(bytes)
            }
            (ExprKind::Principal(p), Type::Principal) => Value::Principal(p),
            (ExprKind::Service(p), Type::Service(_)) => Value::Service(p),
            (ExprKind::Func(p, method), Type::Func(_)) => Value::Func(p, method),
            (ExprKind::Opt(inner), Type::Opt(elem)) => {
                let absent = matches!(inner.kind, ExprKind::Null)
                    && !matches!(self.resolve(elem, &span)?, Type::Null | Type::Reserved);
                if absent { Value::none() } else { Value::some(self.check(*inner, elem)?) }
            }
            (ExprKind::Vec(items), Type::Blob) => self.bytes(items)?,
            (ExprKind::Vec(items), Type::Vec(elem)) => {
                if *self.resolve(elem, &span)? == Type::Nat8 {
                    self.bytes(items)?
                } else {
                    let values = items.into_iter().map(|item| self.check(item, elem));
                    Value::Vec(values.collect::<Result<_>>()?)
                }
            }
            (ExprKind::Record(fields), Type::Record(targets)) => self.record(fields, targets, &span)?,
            (ExprKind::Variant(label, payload), Type::Variant(cases)) => {
                let Some(case) = cases.iter().find(|c| c.label == label) else {
                    return Err(self.error(&span, format!("{} has no case {}", ty, label)));
                };
                let value = self.check(*payload, &case.ty)?;
                Value::Variant(Box::new(FieldValue { label: case.label.clone(), value }))
            }
            (ExprKind::Annotated(inner, annotation), _) => {
                let value = self.check(*inner, &annotation)?;
                reconcile(self.env, value, ty).map_err(|err| self.error(&span, err.to_string()))?
            }
            (kind, _) => return Err(mismatch(&kind)),
        })
    }

    fn number(&self, n: BigInt, target: &Type, span: &Span) -> Result<Value> {
        if *target == Type::Int {
            return Ok(Value::Int(n));
        }
        let out_of_range = || self.error(span, format!("{} is out of range for {}", n, target));
        Ok(match target {
            Type::Nat => Value::Nat(n.to_biguint().ok_or_else(out_of_range)?),
            Type::Nat8 => Value::Nat8(n.to_u8().ok_or_else(out_of_range)?),
            Type::Nat16 => Value::Nat16(n.to_u16().ok_or_else(out_of_range)?),
            Type::Nat32 => Value::Nat32(n.to_u32().ok_or_else(out_of_range)?),
            Type::Nat64 => Value::Nat64(n.to_u64().ok_or_else(out_of_range)?),
            Type::Int8 => Value::Int8(n.to_i8().ok_or_else(out_of_range)?),
            Type::Int16 => Value::Int16(n.to_i16().ok_or_else(out_of_range)?),
            Type::Int32 => Value::Int32(n.to_i32().ok_or_else(out_of_range)?),
            Type::Int64 => Value::Int64(n.to_i64().ok_or_else(out_of_range)?),
            Type::Float32 => Value::Float32(n.to_f32().ok_or_else(out_of_range)?),
            Type::Float64 => Value::Float64(n.to_f64().ok_or_else(out_of_range)?),
            other => return Err(self.error(span, format!("expected {}, found a number", other))),
        })
    }

    fn bytes(&self, items: Vec<Expr>) -> Result<Value> {
        let mut bytes = Vec::with_capacity(items.len());
        for item in items {
            if let Value::Nat8(b) = self.check(item, &Type::Nat8)? {
                bytes.push(b);
            }
        }
        Ok(Value::Blob(bytes))
    }

    /// Output follows the target's field order; absent optional fields are `None`.
    fn record(&self, mut fields: Vec<(Label, Expr)>, targets: &[Field], span: &Span) -> Result<Value> {
        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            let value = match fields.iter().position(|(label, _)| *label == target.label) {
                Some(i) => {
                    let (_, expr) = fields.remove(i);
                    self.check(expr, &target.ty)?
                }
                None => match self.resolve(&target.ty, span)? {
                    Type::Opt(_) => Value::none(),
                    Type::Null => Value::Null,
                    Type::Reserved => Value::Reserved,
                    _ => return Err(self.error(span, format!("missing field {}", target.label))),
                },
            };
            out.push(FieldValue { label: target.label.clone(), value });
        }
        if let Some((label, expr)) = fields.first() {
            return Err(self.error(&expr.span, format!("unexpected field {}", label)));
        }
        Ok(Value::Record(out))
    }
}

// ===== Entry points =====

/// Parses arguments and infers their types. Annotations may only name
/// primitive and constructed types.
pub fn parse_args(source: &str) -> Result<IdlArgs> {
    parse_args_with_env(source, &TypeEnv::new())
}

/// Like [`parse_args`], with annotations resolved against `env`.
pub fn parse_args_with_env(source: &str, env: &TypeEnv) -> Result<IdlArgs> {
    let mut parser = Parser::new(source)?;
    let exprs = parser.parse_arg_exprs()?;
    parser.check_refs(env)?;
    let checker = Checker { source, env };
    let mut types = Vec::with_capacity(exprs.len());
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let (value, ty) = checker.infer(expr)?;
        types.push(ty);
        values.push(value);
    }
    trace!(args = values.len(), "parsed argument text");
    Ok(IdlArgs { env: env.clone(), types, values })
}

/// Parses arguments and checks them against `types`. Trailing arguments
/// whose type is `opt`, `null` or `reserved` may be left out.
pub fn parse_args_typed(source: &str, env: &TypeEnv, types: &[Type]) -> Result<Vec<Value>> {
    let mut parser = Parser::new(source)?;
    let exprs = parser.parse_arg_exprs()?;
    parser.check_refs(env)?;
    let checker = Checker { source, env };
    if exprs.len() > types.len() {
        let span = exprs[types.len()].span.clone();
        return Err(checker.error(&span, format!("expected {} arguments, found {}", types.len(), exprs.len())));
    }
    let end = source.len()..source.len();
    let mut exprs = exprs.into_iter();
    let mut values = Vec::with_capacity(types.len());
    for (i, ty) in types.iter().enumerate() {
        let value = match exprs.next() {
            Some(expr) => checker.check(expr, ty)?,
            None => match checker.resolve(ty, &end)? {
                Type::Opt(_) => Value::none(),
                Type::Null => Value::Null,
                Type::Reserved => Value::Reserved,
                _ => return Err(checker.error(&end, format!("missing argument {} of type {}", i, ty))),
            },
        };
        values.push(value);
    }
    trace!(args = values.len(), "checked argument text");
    Ok(values)
}
