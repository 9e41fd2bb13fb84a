//! # Didlrpc
//!
//! Typed canister calls. A [`Canister`] pairs a canister id with its parsed
//! interface and a [`Transport`]; calls take and return [`didlpack::Value`]s
//! while only opaque `DIDL` bytes cross the transport.

pub mod client;
pub mod mock;
pub mod transport;


pub use client::Canister;
pub use client::Error;
pub use client::Result;
pub use transport::Transport;
pub use transport::TransportError;
