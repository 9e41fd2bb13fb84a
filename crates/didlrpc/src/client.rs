//! # Canister Client
//!
//! Calls methods of a canister described by a parsed `.did` file. Arguments
//! are encoded against the method signature, the call goes out as a query or
//! an update according to the method's annotations, and the reply is decoded
//! against the signature's result types.

use std::sync::Arc;

use didlpack::Decoder;
use didlpack::DecoderConfig;
use didlpack::FromValue;
use didlpack::FuncMode;
use didlpack::FuncType;
use didlpack::Principal;
use didlpack::Value;
use didlparse::Did;
use didlparse::ParseError;
use tracing::debug;

use crate::transport;
use crate::transport::Transport;

#[derive(Debug)]
pub enum Error {
    Transport(transport::TransportError),
    Codec(didlpack::Error),
    Parse(ParseError),
    /// The interface has no method with this name.
    MethodNotFound(String),
    /// The method exists but its type does not resolve to a function.
    NotAFunction(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(e) => write!(f, "Candid error: {}", e),
            Self::Parse(e) => write!(f, "Argument error: {}", e),
            Self::MethodNotFound(name) => write!(f, "Method not found: {}", name),
            Self::NotAFunction(name) => write!(f, "Method {} is not a function", name),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::TransportError> for Error {
    fn from(e: transport::TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<didlpack::Error> for Error {
    fn from(e: didlpack::Error) -> Self {
        Self::Codec(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A handle on one canister: its id, its interface and a transport.
#[derive(Clone)]
pub struct Canister {
    id: Principal,
    did: Arc<Did>,
    transport: Arc<dyn Transport>,
    config: DecoderConfig,
}

impl Canister {
    pub fn new(id: Principal, did: Did, transport: Arc<dyn Transport>) -> Self {
        Self { id, did: Arc::new(did), transport, config: DecoderConfig::default() }
    }

    /// Limits applied when decoding replies.
    pub fn with_decoder_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &Principal {
        &self.id
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    /// The resolved signature of `method`.
    pub fn signature(&self, method: &str) -> Result<&FuncType> {
        let Some(service) = &self.did.service else {
            return Err(Error::MethodNotFound(method.to_string()));
        };
        match self.did.env.method(&service.ty, method) {
            Ok(Some(func)) => Ok(func),
            Ok(None) => Err(Error::MethodNotFound(method.to_string())),
            Err(_) => Err(Error::NotAFunction(method.to_string())),
        }
    }

    /// Calls `method` with `args` and returns the decoded results.
    ///
    /// `oneway` methods return no values and their reply is not decoded.
    pub async fn call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>> {
        let func = self.signature(method)?;
        let arg = didlpack::encode_with_env(&self.did.env, args, &func.args)?;
        let query = func.is_query();
        debug!(canister = %self.id, method, query, bytes = arg.len(), "calling canister");

        let reply = if query {
            self.transport.query(&self.id, method, &arg).await?
        } else {
            self.transport.update(&self.id, method, &arg).await?
        };
        if func.modes.contains(&FuncMode::Oneway) {
            return Ok(Vec::new());
        }

        let values = Decoder::with_config(&reply, self.config).decode_args(&self.did.env, &func.rets)?;
        debug!(canister = %self.id, method, bytes = reply.len(), results = values.len(), "canister replied");
        Ok(values)
    }

    /// Calls `method` with arguments written in Candid value text.
    pub async fn call_text(&self, method: &str, args: &str) -> Result<Vec<Value>> {
        let func = self.signature(method)?;
        let values = didlparse::parse_args_typed(args, &self.did.env, &func.args)?;
        self.call(method, &values).await
    }

    /// Calls a single-result method and extracts the result as `T`.
    pub async fn call_one<T: FromValue>(&self, method: &str, args: &[Value]) -> Result<T> {
        let mut values = self.call(method, args).await?;
        if values.is_empty() {
            return Err(Error::Codec(didlpack::Error::ArgumentCount { expected: 1, found: 0 }));
        }
        Ok(T::from_value(values.swap_remove(0))?)
    }
}
