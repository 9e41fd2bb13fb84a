//! Mock transports for testing.

use didlpack::Principal;

use crate::transport;
use crate::transport::Transport;

/// Which delivery path a call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Update,
}

/// One call as seen by a [`FnTransport`] handler.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub kind: CallKind,
    pub canister: &'a Principal,
    pub method: &'a str,
    pub arg: &'a [u8],
}

/// A request-response transport backed by a closure.
pub struct FnTransport<F>
where
    F: Fn(Call<'_>) -> transport::Result<Vec<u8>> + Send + Sync,
{
    handler: F,
}

impl<F> FnTransport<F>
where
    F: Fn(Call<'_>) -> transport::Result<Vec<u8>> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait::async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(Call<'_>) -> transport::Result<Vec<u8>> + Send + Sync + 'static,
{
    async fn query(&self, canister: &Principal, method: &str, arg: &[u8]) -> transport::Result<Vec<u8>> {
        (self.handler)(Call { kind: CallKind::Query, canister, method, arg })
    }

    async fn update(&self, canister: &Principal, method: &str, arg: &[u8]) -> transport::Result<Vec<u8>> {
        (self.handler)(Call { kind: CallKind::Update, canister, method, arg })
    }
}
