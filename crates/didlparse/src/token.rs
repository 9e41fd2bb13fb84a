//! # Tokens
//!
//! The lexical grammar shared by `.did` files and Candid value text.
//! Tokens carry no payload; the parser reads literals back out of the
//! source through the token span.

use logos::Logos;
use logos::Span;

use crate::error::ParseError;
use crate::error::Result;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    Comment,

    // Keywords
    #[token("type")]
    Type,
    #[token("import")]
    Import,
    #[token("service")]
    Service,
    #[token("func")]
    Func,
    #[token("query")]
    Query,
    #[token("composite_query")]
    CompositeQuery,
    #[token("oneway")]
    Oneway,
    #[token("opt")]
    Opt,
    #[token("vec")]
    Vec,
    #[token("record")]
    Record,
    #[token("variant")]
    Variant,
    #[token("blob")]
    Blob,
    #[token("principal")]
    Principal,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    // Literals
    #[regex(r"[0-9][0-9_]*")]
    Decimal,
    #[regex(r"0x[0-9a-fA-F][0-9a-fA-F_]*")]
    Hex,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9][0-9_]*)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9][0-9_]*")]
    Float,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Text,
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl Token {
    /// How the token is named in error messages.
    pub fn describe(self) -> &'static str {
        match self {
            Token::Comment => "comment",
            Token::Type => "`type`",
            Token::Import => "`import`",
            Token::Service => "`service`",
            Token::Func => "`func`",
            Token::Query => "`query`",
            Token::CompositeQuery => "`composite_query`",
            Token::Oneway => "`oneway`",
            Token::Opt => "`opt`",
            Token::Vec => "`vec`",
            Token::Record => "`record`",
            Token::Variant => "`variant`",
            Token::Blob => "`blob`",
            Token::Principal => "`principal`",
            Token::Null => "`null`",
            Token::True => "`true`",
            Token::False => "`false`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::Colon => "`:`",
            Token::Semi => "`;`",
            Token::Comma => "`,`",
            Token::Equals => "`=`",
            Token::Arrow => "`->`",
            Token::Dot => "`.`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Decimal | Token::Hex => "number",
            Token::Float => "float",
            Token::Text => "text literal",
            Token::Ident => "identifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

/// Splits `source` into tokens, skipping whitespace and comments.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(next) = lexer.next() {
        match next {
            Ok(token) => tokens.push(Spanned { token, span: lexer.span() }),
            Err(()) => {
                let message = format!("unexpected input {:?}", lexer.slice());
                return Err(ParseError::at(source, lexer.span(), message));
            }
        }
    }
    Ok(tokens)
}

/// Decodes the body of a text literal (without quotes) into bytes.
///
/// Escapes: `\n \r \t \\ \" \'`, `\u{X..}` for a code point and `\HH` for a
/// raw byte. Raw bytes make blob literals possible; text literals must still
/// decode to UTF-8.
pub fn unescape(body: &str) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('\'') => out.push(b'\''),
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err("expected `{` after \\u".to_string());
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('_') => {}
                        Some(d) if d.is_ascii_hexdigit() => digits.push(d),
                        _ => return Err("unterminated unicode escape".to_string()),
                    }
                }
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| format!("invalid unicode escape {:?}", digits))?;
                let c = char::from_u32(code).ok_or_else(|| format!("invalid code point {:x}", code))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Some(hi) if hi.is_ascii_hexdigit() => {
                let lo = chars
                    .next()
                    .filter(char::is_ascii_hexdigit)
                    .ok_or_else(|| "byte escapes take two hex digits".to_string())?;
                let byte = u8::from_str_radix(&format!("{}{}", hi, lo), 16)
                    .map_err(|_| "invalid byte escape".to_string())?;
                out.push(byte);
            }
            Some(other) => return Err(format!("unknown escape \\{}", other)),
            None => return Err("dangling backslash".to_string()),
        }
    }
    Ok(out)
}
