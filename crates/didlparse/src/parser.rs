//! # Parser
//!
//! Recursive descent over the token stream. There is no error recovery: the
//! first grammar violation is returned with its position.
//!
//! ```text
//! prog     := (type <name> = <type> ;)* (service <id>? : (<args> ->)? <actor> ;?)?
//! type     := <prim> | <id> | opt <type> | vec <type> | blob | principal
//!           | record { <field>;* } | variant { <field>;* }
//!           | func <functype> | service <actor>
//! field    := <label> : <type> | <type> | <label>      (bare labels only in variants)
//! functype := <args> -> (<args> | <type>) <mode>*
//! actor    := { (<name> : (<functype> | <id>));* } | <id>
//! ```

use didlpack::ensure_sufficient_stack;
use didlpack::Field;
use didlpack::FuncMode;
use didlpack::FuncType;
use didlpack::Label;
use didlpack::Method;
use didlpack::Type;
use didlpack::TypeEnv;
use logos::Span;

use crate::did::Did;
use crate::did::Service;
use crate::error::ParseError;
use crate::error::Result;
use crate::token::tokenize;
use crate::token::unescape;
use crate::token::Spanned;
use crate::token::Token;

/// Maps a primitive type name to its type. `null`, `blob` and `principal`
/// are keywords and handled by the grammar directly.
pub fn primitive(name: &str) -> Option<Type> {
    let ty = match name {
        "bool" => Type::Bool,
        "nat" => Type::Nat,
        "int" => Type::Int,
        "nat8" => Type::Nat8,
        "nat16" => Type::Nat16,
        "nat32" => Type::Nat32,
        "nat64" => Type::Nat64,
        "int8" => Type::Int8,
        "int16" => Type::Int16,
        "int32" => Type::Int32,
        "int64" => Type::Int64,
        "float32" => Type::Float32,
        "float64" => Type::Float64,
        "text" => Type::Text,
        "reserved" => Type::Reserved,
        "empty" => Type::Empty,
        _ => return None,
    };
    Some(ty)
}

pub(crate) struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
    /// Type names referenced so far, checked once all definitions are known.
    refs: Vec<(String, Span)>,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Result<Self> {
        Ok(Self { source, tokens: tokenize(source)?, pos: 0, refs: Vec::new() })
    }

    // ===== Token access =====

    pub fn peek(&self) -> Option<Token> {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).map(|t| t.token)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// The span of the next token, or an empty span at the end of input.
    pub fn span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(t) => t.span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    /// The end offset of the last consumed token.
    pub fn last_end(&self) -> usize {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(t) => t.span.end,
            None => 0,
        }
    }

    pub fn bump(&mut self) -> Span {
        let span = self.span();
        if !self.at_end() {
            self.pos += 1;
        }
        span
    }

    pub fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: Token) -> Result<Span> {
        if self.peek() == Some(token) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(token.describe()))
        }
    }

    pub fn expect_end(&self) -> Result<()> {
        if self.at_end() { Ok(()) } else { Err(self.unexpected("end of input")) }
    }

    pub fn slice(&self, span: &Span) -> &'s str {
        &self.source[span.clone()]
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn error_at(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::at(self.source, span, message)
    }

    /// "expected X, found Y" at the next token.
    pub fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            Some(token) => token.describe(),
            None => "end of input",
        };
        self.error_at(self.span(), format!("expected {}, found {}", expected, found))
    }

    // ===== Literals and names =====

    /// Reads a text literal token as UTF-8 text.
    pub fn text(&mut self) -> Result<(String, Span)> {
        let (bytes, span) = self.text_bytes()?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok((text, span)),
            Err(_) => Err(self.error_at(span, "text literal is not valid utf-8")),
        }
    }

    /// Reads a text literal token as raw bytes, honouring `\HH` escapes.
    pub fn text_bytes(&mut self) -> Result<(Vec<u8>, Span)> {
        let span = self.expect(Token::Text)?;
        let raw = self.slice(&span);
        let body = &raw[1..raw.len() - 1];
        unescape(body).map(|bytes| (bytes, span.clone())).map_err(|msg| self.error_at(span, msg))
    }

    /// An identifier or a quoted name.
    pub fn name(&mut self) -> Result<(String, Span)> {
        match self.peek() {
            Some(Token::Ident) => {
                let span = self.bump();
                Ok((self.slice(&span).to_string(), span))
            }
            Some(Token::Text) => self.text(),
            _ => Err(self.unexpected("a name")),
        }
    }

    /// A field label: a name, or a decimal field id.
    pub fn label(&mut self) -> Result<Label> {
        if self.peek() == Some(Token::Decimal) {
            let span = self.bump();
            let digits = self.slice(&span).replace('_', "");
            return digits
                .parse::<u32>()
                .map(Label::Id)
                .map_err(|_| self.error_at(span, "field id does not fit in 32 bits"));
        }
        self.name().map(|(name, _)| Label::Named(name))
    }

    /// Whether the next two tokens are a label followed by `sep`.
    pub fn at_label_then(&self, sep: Token) -> bool {
        matches!(self.peek(), Some(Token::Ident | Token::Text | Token::Decimal))
            && self.peek_nth(1) == Some(sep)
    }

    // ===== Types =====

    pub fn parse_type(&mut self) -> Result<Type> {
        ensure_sufficient_stack(|| self.parse_type_inner())
    }

    fn parse_type_inner(&mut self) -> Result<Type> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("a type"));
        };
        match token {
            Token::Null => {
                self.bump();
                Ok(Type::Null)
            }
            Token::Blob => {
                self.bump();
                Ok(Type::Blob)
            }
            Token::Principal => {
                self.bump();
                Ok(Type::Principal)
            }
            Token::Opt => {
                self.bump();
                Ok(Type::opt(self.parse_type()?))
            }
            Token::Vec => {
                self.bump();
                Ok(Type::vec(self.parse_type()?))
            }
            Token::Record => {
                self.bump();
                self.parse_fields(false).map(Type::Record)
            }
            Token::Variant => {
                self.bump();
                self.parse_fields(true).map(Type::Variant)
            }
            Token::Func => {
                self.bump();
                self.parse_func_type().map(Type::Func)
            }
            Token::Service => {
                self.bump();
                self.parse_methods().map(Type::Service)
            }
            Token::Ident => {
                let span = self.bump();
                let name = self.slice(&span);
                Ok(match primitive(name) {
                    Some(ty) => ty,
                    None => {
                        self.refs.push((name.to_string(), span));
                        Type::var(name)
                    }
                })
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    fn parse_fields(&mut self, variant: bool) -> Result<Vec<Field>> {
        self.expect(Token::LBrace)?;
        let mut fields: Vec<Field> = Vec::new();
        let mut next_position = 0u32;
        while !self.eat(Token::RBrace) {
            let start = self.span();
            let field = if self.at_label_then(Token::Colon) {
                let label = self.label()?;
                self.bump();
                Field { label, ty: self.parse_type()? }
            } else if variant && matches!(self.peek(), Some(Token::Ident | Token::Text | Token::Decimal)) {
                Field { label: self.label()?, ty: Type::Null }
            } else {
                Field { label: Label::Unnamed(next_position), ty: self.parse_type()? }
            };
            if let Some(prev) = fields.iter().find(|f| f.label == field.label) {
                let message = if prev.label.to_string() == field.label.to_string() {
                    format!("duplicate field {}", field.label)
                } else {
                    format!("field {} collides with {} (hash {})", field.label, prev.label, field.label.id())
                };
                return Err(self.error_at(start.start..self.last_end(), message));
            }
            next_position = field.label.id().wrapping_add(1);
            fields.push(field);
            if !self.eat(Token::Semi) {
                self.expect(Token::RBrace)?;
                break;
            }
        }
        Ok(fields)
    }

    /// A parenthesised argument type list. Argument names are documentation only.
    pub fn parse_arg_types(&mut self) -> Result<Vec<Type>> {
        self.expect(Token::LParen)?;
        let mut types = Vec::new();
        while !self.eat(Token::RParen) {
            if matches!(self.peek(), Some(Token::Ident | Token::Text)) && self.peek_nth(1) == Some(Token::Colon) {
                self.bump();
                self.bump();
            }
            types.push(self.parse_type()?);
            if !self.eat(Token::Comma) {
                self.expect(Token::RParen)?;
                break;
            }
        }
        Ok(types)
    }

    fn parse_func_type(&mut self) -> Result<FuncType> {
        let args = self.parse_arg_types()?;
        self.expect(Token::Arrow)?;
        let rets = if self.peek() == Some(Token::LParen) {
            self.parse_arg_types()?
        } else {
            vec![self.parse_type()?]
        };
        let mut func = FuncType::new(args, rets);
        loop {
            let mode = match self.peek() {
                Some(Token::Query) => FuncMode::Query,
                Some(Token::Oneway) => FuncMode::Oneway,
                Some(Token::CompositeQuery) => FuncMode::CompositeQuery,
                _ => break,
            };
            self.bump();
            func = func.with_mode(mode);
        }
        if func.modes.contains(&FuncMode::Oneway) && !func.rets.is_empty() {
            return Err(self.error_at(self.last_end()..self.last_end(), "oneway functions return nothing"));
        }
        Ok(func)
    }

    fn parse_methods(&mut self) -> Result<Vec<Method>> {
        self.expect(Token::LBrace)?;
        let mut methods: Vec<Method> = Vec::new();
        while !self.eat(Token::RBrace) {
            let (name, span) = self.name()?;
            if methods.iter().any(|m| m.name == name) {
                return Err(self.error_at(span, format!("duplicate method {}", name)));
            }
            self.expect(Token::Colon)?;
            let ty = match self.peek() {
                Some(Token::LParen) => Type::Func(self.parse_func_type()?),
                _ => self.parse_type()?,
            };
            methods.push(Method { name, ty });
            if !self.eat(Token::Semi) {
                self.expect(Token::RBrace)?;
                break;
            }
        }
        Ok(methods)
    }

    // ===== Programs =====

    pub fn parse_did(&mut self) -> Result<Did> {
        let mut env = TypeEnv::new();
        let mut defs: Vec<(String, Span)> = Vec::new();
        let mut service = None;
        let mut service_span = 0..0;
        while let Some(token) = self.peek() {
            match token {
                Token::Type => {
                    self.bump();
                    let (name, span) = self.name()?;
                    if primitive(&name).is_some() {
                        return Err(self.error_at(span, format!("{} is a primitive type", name)));
                    }
                    if env.contains(&name) {
                        return Err(self.error_at(span, format!("duplicate type definition {}", name)));
                    }
                    self.expect(Token::Equals)?;
                    let ty = self.parse_type()?;
                    self.expect(Token::Semi)?;
                    env.insert(name.clone(), ty);
                    defs.push((name, span));
                }
                Token::Import => {
                    return Err(self.error_at(self.span(), "imports are not supported"));
                }
                Token::Service => {
                    service_span = self.bump();
                    service = Some(self.parse_service()?);
                    self.eat(Token::Semi);
                    self.expect_end()?;
                }
                _ => return Err(self.unexpected("`type` or `service`")),
            }
        }
        self.check_refs(&env)?;
        for (name, span) in defs {
            if let Err(err) = env.resolve(&Type::var(name)) {
                return Err(self.error_at(span, err.to_string()));
            }
        }
        let did = Did { env, service };
        did.validate().map_err(|err| self.error_at(service_span, err.to_string()))?;
        Ok(did)
    }

    fn parse_service(&mut self) -> Result<Service> {
        let name = match self.peek() {
            Some(Token::Ident) => Some(self.name()?.0),
            _ => None,
        };
        self.expect(Token::Colon)?;
        let init = if self.peek() == Some(Token::LParen) {
            let args = self.parse_arg_types()?;
            self.expect(Token::Arrow)?;
            args
        } else {
            Vec::new()
        };
        let ty = match self.peek() {
            Some(Token::LBrace) => Type::Service(self.parse_methods()?),
            Some(Token::Ident) => self.parse_type()?,
            _ => return Err(self.unexpected("a service body or type name")),
        };
        Ok(Service { name, init, ty })
    }

    /// Fails at the first referenced type name `env` does not define.
    pub fn check_refs(&self, env: &TypeEnv) -> Result<()> {
        match self.refs.iter().find(|(name, _)| !env.contains(name)) {
            Some((name, span)) => Err(self.error_at(span.clone(), format!("unbound type identifier {}", name))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ty(source: &str) -> Type {
        let mut parser = Parser::new(source).unwrap();
        let ty = parser.parse_type().unwrap();
        parser.expect_end().unwrap();
        ty
    }

    #[test]
    fn primitives_and_constructors() {
        assert_eq!(ty("nat"), Type::Nat);
        assert_eq!(ty("opt vec nat8"), Type::opt(Type::vec(Type::Nat8)));
        assert_eq!(ty("blob"), Type::Blob);
        assert_eq!(ty("List"), Type::var("List"));
    }

    #[test]
    fn records_and_tuples() {
        assert_eq!(
            ty("record { foo : text; bar : nat; }"),
            Type::record([("foo", Type::Text), ("bar", Type::Nat)])
        );
        assert_eq!(ty("record { nat; text }"), Type::tuple([Type::Nat, Type::Text]));
        assert_eq!(ty("record { 4895187 : nat }"), Type::record([(Label::Id(4895187), Type::Nat)]));
        assert_eq!(ty("record { \"first name\" : text }"), Type::record([("first name", Type::Text)]));
    }

    #[test]
    fn variants_with_bare_cases() {
        assert_eq!(
            ty("variant { ok; err : text }"),
            Type::variant([("ok", Type::Null), ("err", Type::Text)])
        );
    }

    #[test]
    fn func_types() {
        let expected = FuncType::new(vec![Type::Text, Type::Nat8], vec![Type::Nat64]).with_mode(FuncMode::Query);
        assert_eq!(ty("func (name : text, age : nat8) -> (nat64) query"), Type::Func(expected));
        assert_eq!(ty("func () -> nat"), Type::Func(FuncType::new(vec![], vec![Type::Nat])));
    }

    #[test]
    fn rejects_collisions_and_duplicates() {
        let err = Parser::new("record { a : nat; a : text }").unwrap().parse_type().unwrap_err();
        assert!(err.message.contains("duplicate field a"), "{}", err);
        let err = Parser::new("record { foo : nat; 5097222 : nat }").unwrap().parse_type().unwrap_err();
        assert!(err.message.contains("collides"), "{}", err);
    }

    #[test]
    fn rejects_oneway_with_results() {
        let err = Parser::new("func () -> (nat) oneway").unwrap().parse_type().unwrap_err();
        assert!(err.message.contains("oneway"), "{}", err);
    }

    #[test]
    fn reports_unexpected_tokens() {
        let err = Parser::new("record { foo : }").unwrap().parse_type().unwrap_err();
        assert_eq!(err.message, "expected a type, found `}`");
        assert_eq!((err.line, err.column), (1, 16));
    }
}
