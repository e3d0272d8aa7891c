//! Request Dispatch
//!
//! Turns each inbound frame into a [`Request`] and hands it to the
//! application [`Handler`] together with a [`Sender`] for replies.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use super::connection::FrameCallback;
use super::frame::{Frame, FrameKind};
use super::peers::{Peers, Sender};
use super::registry::ConnectionId;

/// One inbound frame plus everything a handler needs to act on it
pub struct Request {
    pub frame: Frame,
    /// Connection the frame arrived on
    pub peer_id: ConnectionId,
    /// Every registered connection, for fan-out
    pub peers: Peers,
    /// Cancelled when the originating connection closes
    pub cancel: CancellationToken,
}

impl Request {
    pub fn kind(&self) -> FrameKind {
        self.frame.kind()
    }

    pub fn payload(&self) -> &[u8] {
        self.frame.payload()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Application logic invoked for every inbound frame
///
/// Frames from one connection are handled strictly in arrival order; the next
/// frame is not read until `handle` returns. Frames from different
/// connections are handled concurrently.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, reply_to: &Sender, request: Request);
}

/// Invoke `handler`, containing any panic to this one request
pub async fn dispatch(handler: &dyn Handler, reply_to: &Sender, request: Request) {
    let kind = request.kind();
    let outcome = AssertUnwindSafe(handler.handle(reply_to, request))
        .catch_unwind()
        .await;

    if outcome.is_err() {
        tracing::error!(
            connection_id = %reply_to.id(),
            kind = ?kind,
            "Handler panicked, request dropped"
        );
    }
}

/// Inbound callback wired into a connection by the registry
pub(crate) fn frame_callback(
    sender: Sender,
    peers: Peers,
    handler: Arc<dyn Handler>,
) -> FrameCallback {
    Arc::new(move |cancel: CancellationToken, frame: Frame| {
        let sender = sender.clone();
        let peers = peers.clone();
        let handler = Arc::clone(&handler);

        async move {
            let request = Request {
                frame,
                peer_id: sender.id(),
                peers,
                cancel,
            };
            dispatch(handler.as_ref(), &sender, request).await;
        }
        .boxed()
    })
}
