//! # Error Definitions
//!
//! Every failure the binary engine can report. None of these are retryable:
//! a single malformed field fails the whole encode or decode call.

use crate::types::Label;

/// Didlpack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer exhausted while reading.
    TruncatedInput,
    /// A signed LEB128 number ran off the end of the buffer without a terminating byte.
    TooShort,
    /// The message does not start with `DIDL`.
    BadMagic([u8; 4]),
    /// A type reference is neither a primitive opcode nor a valid table index.
    UnknownOpcode(i64),
    /// A value's shape does not match the type it was paired with at encode time.
    EncodeValue { expected: String, found: String },
    /// A decoded value cannot populate the requested Rust representation.
    Unmarshal(String),
    /// A required record field is absent and its target type is not `opt`.
    MissingField(Label),
    /// A variant tag (by field hash) is not part of the target variant.
    UnknownVariant(u32),
    /// The wire value cannot be reconciled with the target type.
    TypeMismatch { expected: String, found: String },
    /// Two distinct labels of one record/variant share a field hash.
    HashCollision { hash: u32, first: String, second: String },
    /// Text payload is not valid UTF-8.
    InvalidUtf8,
    /// A `Type::Var` names a type the environment does not define.
    UnboundType(String),
    /// The argument list length does not match the type list length.
    ArgumentCount { expected: usize, found: usize },
    /// Value or type nesting exceeded the configured depth.
    RecursionLimitExceeded,
    /// The message decodes to more values than the configured budget.
    ValueLimitExceeded { limit: usize },
    /// Structurally invalid wire data (bad tag byte, unsorted fields, trailing bytes, ...).
    Malformed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TruncatedInput => write!(f, "input truncated"),
            Error::TooShort => write!(f, "signed leb128 too short"),
            Error::BadMagic(m) => write!(f, "bad magic number: {:02x?}", m),
            Error::UnknownOpcode(op) => write!(f, "unknown opcode or type index: {}", op),
            Error::EncodeValue { expected, found } => {
                write!(f, "cannot encode {} as {}", found, expected)
            }
            Error::Unmarshal(msg) => write!(f, "unmarshal failed: {}", msg),
            Error::MissingField(label) => write!(f, "missing record field {}", label),
            Error::UnknownVariant(hash) => write!(f, "unknown variant tag {}", hash),
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Error::HashCollision { hash, first, second } => {
                write!(f, "field hash collision: {} and {} both hash to {}", first, second, hash)
            }
            Error::InvalidUtf8 => write!(f, "text is not valid utf-8"),
            Error::UnboundType(name) => write!(f, "unbound type identifier {}", name),
            Error::ArgumentCount { expected, found } => {
                write!(f, "expected {} arguments, found {}", expected, found)
            }
            Error::RecursionLimitExceeded => write!(f, "recursion limit exceeded"),
            Error::ValueLimitExceeded { limit } => write!(f, "message decodes to more than {} values", limit),
            Error::Malformed(msg) => write!(f, "malformed message: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub(crate) fn encode_value(expected: impl ToString, found: impl ToString) -> Self {
        Error::EncodeValue { expected: expected.to_string(), found: found.to_string() }
    }

    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Error::TypeMismatch { expected: expected.to_string(), found: found.to_string() }
    }
}

/// Specialized `Result` for didlpack operations.
pub type Result<T> = std::result::Result<T, Error>;
