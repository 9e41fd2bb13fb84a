//! # Transport Abstraction
//!
//! A minimal, async interface for delivering Candid messages to a canister.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about types or values.
//!   It moves an encoded argument out and an encoded reply back.
//! - **Two Paths**: queries are answered by a single replica, updates go
//!   through consensus. The transport decides how each is delivered
//!   (HTTP endpoints, request signing, polling for certified replies).

use std::fmt;

use didlpack::Principal;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The replica is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The operation timed out before a reply was received.
    Timeout,
    /// The replica rejected the payload size.
    PayloadTooLarge,
    /// The canister or replica rejected the call.
    Rejected { code: u64, message: String },
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Rejected { code, message } => write!(f, "Call rejected ({}): {}", code, message),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to deliver an encoded argument to a canister method and
/// receive the encoded reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
///
/// # invariants
/// - Must return `Ok(vec)` with the raw `DIDL` reply bytes on success.
/// - Must return `Err` if the network fails or the call is rejected.
/// - Should not interpret the argument or reply bytes.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// A read-only call answered without consensus.
    async fn query(&self, canister: &Principal, method: &str, arg: &[u8]) -> Result<Vec<u8>>;

    /// A state-changing call. For `oneway` methods the reply is ignored.
    async fn update(&self, canister: &Principal, method: &str, arg: &[u8]) -> Result<Vec<u8>>;
}
