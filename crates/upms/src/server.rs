//! Async request server.
//!
//! Requests arrive on a bounded channel. Each one is handed to its own
//! blocking worker, so a slow downstream service stalls only the request
//! waiting on it. Replies go back on a per-request oneshot.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use upms_core::CallingContext;

use crate::error::{Result, ServiceError};
use crate::stub::UriPermissionStub;
use crate::transport::LocalTransport;

/// One queued request.
#[derive(Debug)]
pub struct Call {
    pub ctx: CallingContext,
    pub data: Bytes,
    pub reply: oneshot::Sender<Bytes>,
}

/// Handle to a running server.
pub struct ServerHandle {
    sender: mpsc::Sender<Call>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Start serving `stub` on the current tokio runtime.
pub fn spawn(stub: Arc<UriPermissionStub>) -> ServerHandle {
    let depth = stub.service().config().request_queue_depth.max(1);
    let (sender, receiver) = mpsc::channel(depth);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(serve(stub, receiver, shutdown_rx));
    tracing::info!(depth, "uri permission server started");
    ServerHandle {
        sender,
        shutdown: shutdown_tx,
        task,
    }
}

async fn serve(
    stub: Arc<UriPermissionStub>,
    mut receiver: mpsc::Receiver<Call>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            call = receiver.recv() => match call {
                Some(call) => handle(Arc::clone(&stub), call),
                None => break,
            },
        }
    }
    tracing::info!("uri permission server stopped");
}

fn handle(stub: Arc<UriPermissionStub>, call: Call) {
    tokio::spawn(async move {
        let Call { ctx, data, reply } = call;
        let worker = tokio::task::spawn_blocking(move || stub.on_remote_request(&ctx, &data));
        match worker.await {
            Ok(bytes) => {
                if reply.send(bytes).is_err() {
                    tracing::debug!("caller went away before reply");
                }
            }
            Err(e) => tracing::error!(error = %e, "request worker failed"),
        }
    });
}

impl ServerHandle {
    /// Send one request as `ctx` and wait for the reply bytes.
    pub async fn call(&self, ctx: CallingContext, data: Bytes) -> Result<Bytes> {
        call(&self.sender, ctx, data).await
    }

    /// A client transport that calls as `ctx`.
    pub fn transport(&self, ctx: CallingContext) -> LocalTransport {
        LocalTransport::new(ctx, self.sender.clone())
    }

    /// Stop accepting requests and wait for the accept loop to exit.
    /// Requests already handed to workers still complete.
    pub async fn shutdown(self) {
        let ServerHandle { shutdown, task, .. } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "server task ended abnormally");
        }
    }
}

pub(crate) async fn call(
    sender: &mpsc::Sender<Call>,
    ctx: CallingContext,
    data: Bytes,
) -> Result<Bytes> {
    let (reply, rx) = oneshot::channel();
    sender
        .send(Call { ctx, data, reply })
        .await
        .map_err(|_| ServiceError::Transport("server stopped".into()))?;
    rx.await
        .map_err(|_| ServiceError::Transport("reply dropped".into()))
}
