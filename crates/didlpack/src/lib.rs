//! # Didlpack
//!
//! A type-directed encoder and decoder for the Candid binary format, the
//! self-describing wire format used to call Internet Computer canisters.
//!
//! ## Philosophy
//!
//! - **Typed Pairs**: a [`Value`] carries no type. Every encode pairs it with exactly
//!   one [`Type`]; illegal pairings are errors, never panics.
//! - **Arena + Index**: constructed types live in a per-message [`TypeTable`] and
//!   refer to each other by index, which is also how the wire addresses them.
//!   Recursion in Rust-side types goes through named [`TypeEnv`] entries.
//! - **Wire First**: decoding always follows the wire types. Expected types are
//!   applied afterwards by structural subtyping ([`reconcile`]).
//! - **Bounded**: recursion depth, table size and trailing bytes are governed by
//!   [`DecoderConfig`]; deep values grow the stack instead of overflowing it.
//!
//! ## Format
//!
//! - **Header**: `"DIDL"`
//! - **Type Table**: `[count: uleb][entry: sleb opcode + payload]*`
//! - **Arguments**: `[count: uleb][type ref: sleb]*`, negative refs are primitive opcodes
//! - **Values**: one per argument, encoded by its type
//!
//! Fixed-width numbers are little-endian; `nat` and `int` are LEB128.
//!
//! ```
//! use didlpack::{decode_args, encode, Type, Value};
//!
//! let ty = Type::record([("foo", Type::Text), ("bar", Type::Int)]);
//! let value = Value::record([("foo", Value::text("baz")), ("bar", Value::int(42))]);
//! let bytes = encode(&[value.clone()], &[ty.clone()])?;
//! assert_eq!(decode_args(&bytes, &[ty])?, vec![value]);
//! # Ok::<(), didlpack::Error>(())
//! ```

mod config;
mod convert;
mod cursor;
mod decoder;
mod encoder;
mod error;
mod principal;
mod stack;
mod subtype;
mod table;
mod text;
mod types;
mod value;

pub mod leb128;


pub use config::DecoderConfig;
pub use config::DEFAULT_MAX_DEPTH;
pub use config::DEFAULT_MAX_TABLE_ENTRIES;
pub use config::DEFAULT_MAX_VALUES;
pub use convert::FromValue;
pub use cursor::Cursor;
pub use decoder::decode;
pub use decoder::decode_args;
pub use decoder::decode_args_with_env;
pub use decoder::Decoder;
pub use decoder::Message;
pub use encoder::encode;
pub use encoder::encode_value;
pub use encoder::encode_with_env;
pub use encoder::Encoder;
pub use encoder::MAGIC;
pub use error::Error;
pub use error::Result;
pub use principal::Principal;
pub use principal::MAX_PRINCIPAL_LEN;
pub use stack::ensure_sufficient_stack;
pub use subtype::check_args;
pub use subtype::reconcile;
pub use subtype::reconcile_args;
pub use table::read_table;
pub use table::read_type_ref;
pub use table::TypeTable;
pub use text::is_plain_ident;
pub use text::render_args;
pub use text::KEYWORDS;
pub use types::idl_hash;
pub use types::sorted_fields;
pub use types::Field;
pub use types::FuncMode;
pub use types::FuncType;
pub use types::Label;
pub use types::Method;
pub use types::Opcode;
pub use types::Type;
pub use types::TypeEnv;
pub use value::FieldValue;
pub use value::Value;
