//! Transport abstraction for the client proxy.
//!
//! The transport carries opaque request bytes to the service and brings the
//! reply bytes back. The caller's identity is a property of the transport,
//! never of the payload.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use upms_core::CallingContext;

use crate::error::Result;
use crate::server::{self, Call};

/// Request/reply transport to a permission service.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send one request and wait for its reply.
    async fn transact(&self, data: Bytes) -> Result<Bytes>;

    /// Identity the service sees for requests sent through this transport.
    fn calling_context(&self) -> CallingContext;
}

/// In-process transport into a [`server`](crate::server) queue.
#[derive(Clone)]
pub struct LocalTransport {
    ctx: CallingContext,
    sender: mpsc::Sender<Call>,
}

impl LocalTransport {
    pub fn new(ctx: CallingContext, sender: mpsc::Sender<Call>) -> Self {
        Self { ctx, sender }
    }
}

#[async_trait]
impl RpcTransport for LocalTransport {
    async fn transact(&self, data: Bytes) -> Result<Bytes> {
        server::call(&self.sender, self.ctx, data).await
    }

    fn calling_context(&self) -> CallingContext {
        self.ctx
    }
}
