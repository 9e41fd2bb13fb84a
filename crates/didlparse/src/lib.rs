//! # Didlparse
//!
//! The textual side of Candid: `.did` interface descriptions, standalone
//! type expressions and value text. Everything parses into the
//! [`didlpack`] type and value model, so parsed types can be handed straight
//! to the binary encoder and decoder.
//!
//! ```
//! use didlparse::parse_did;
//!
//! let did = parse_did("service : { inc : () -> (nat); read : () -> (nat) query }")?;
//! assert!(did.method("read").is_some_and(|f| f.is_query()));
//! # Ok::<(), didlparse::ParseError>(())
//! ```

mod did;
mod error;
mod parser;
mod token;
mod value;

use didlpack::Type;
use tracing::debug;

pub use did::Did;
pub use did::Service;
pub use error::ParseError;
pub use error::Result;
pub use parser::primitive;
pub use token::tokenize;
pub use token::Spanned;
pub use token::Token;
pub use value::parse_args;
pub use value::parse_args_typed;
pub use value::parse_args_with_env;
pub use value::IdlArgs;

use crate::parser::Parser;

/// Either a whole interface description or a single type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Prog(Did),
    Type(Type),
}

/// Parses `source` as a `.did` program when it starts like one
/// (`type`, `import`, `service :`, or nothing at all), otherwise as a type.
pub fn parse(source: &str) -> Result<Parsed> {
    let parser = Parser::new(source)?;
    let program = match parser.peek() {
        None | Some(Token::Type) | Some(Token::Import) => true,
        Some(Token::Service) => parser.peek_nth(1) != Some(Token::LBrace),
        _ => false,
    };
    if program { parse_did(source).map(Parsed::Prog) } else { parse_type(source).map(Parsed::Type) }
}

/// Parses a `.did` interface description.
///
/// Every referenced type name must be defined, alias cycles are rejected,
/// and every service method must resolve to a function type.
pub fn parse_did(source: &str) -> Result<Did> {
    let mut parser = Parser::new(source)?;
    let did = parser.parse_did()?;
    debug!(
        definitions = did.env.len(),
        methods = did.methods().len(),
        "parsed interface description"
    );
    Ok(did)
}

/// Parses a single type expression. Type names are left as `Type::Var`.
pub fn parse_type(source: &str) -> Result<Type> {
    let mut parser = Parser::new(source)?;
    let ty = parser.parse_type()?;
    parser.expect_end()?;
    Ok(ty)
}
