//! Transport Abstraction
//!
//! A [`Transport`] is one physical duplex connection split into a frame sink
//! and a frame stream. Both halves are boxed so a [`Connection`] does not care
//! whether it is driving an axum WebSocket or an in-process pipe.
//!
//! [`Connection`]: super::Connection

use std::pin::Pin;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{future, sink, stream, stream::BoxStream, Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use super::frame::Frame;

/// Write half of a transport
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Read half of a transport
pub type FrameStream = BoxStream<'static, Result<Frame, TransportError>>;

/// Transport faults. Any of these is fatal to the connection that hit it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("No frame received for {0:?}")]
    ReadTimeout(Duration),

    #[error("Peer disconnected")]
    Disconnected,
}

/// A duplex connection split into its two halves
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    /// Build a transport from any frame sink and frame stream
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Frame, Error = TransportError> + Send + 'static,
        R: futures_util::Stream<Item = Result<Frame, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        }
    }

    /// Wrap an upgraded axum WebSocket
    ///
    /// Ping and pong messages are swallowed (axum answers pings itself) and a
    /// close message ends the stream, which the connection treats as the peer
    /// going away.
    pub fn from_websocket(socket: WebSocket) -> Self {
        let (ws_sink, ws_stream) = socket.split();

        let sink = ws_sink
            .sink_map_err(TransportError::from)
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(Message::from(frame))));

        let stream = ws_stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
                    Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes))),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            });

        Self::new(sink, stream)
    }
}

/// Create an in-process transport and the peer that drives its other end
pub fn memory() -> (Transport, MemoryPeer) {
    let (to_server, from_peer) = mpsc::unbounded_channel::<Result<Frame, TransportError>>();
    let (to_peer, from_server) = mpsc::unbounded_channel::<Frame>();

    let sink = sink::unfold(to_peer, |to_peer, frame: Frame| async move {
        to_peer
            .send(frame)
            .map_err(|_| TransportError::Disconnected)?;
        Ok::<_, TransportError>(to_peer)
    });

    let stream = stream::unfold(from_peer, |mut from_peer| async move {
        from_peer.recv().await.map(|item| (item, from_peer))
    });

    let peer = MemoryPeer {
        to_server: Some(to_server),
        from_server,
    };

    (Transport::new(sink, stream), peer)
}

/// Client end of an in-process transport
pub struct MemoryPeer {
    to_server: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    from_server: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Deliver a frame to the connection. Returns false once disconnected.
    pub fn send(&self, frame: Frame) -> bool {
        self.push(Ok(frame))
    }

    /// Deliver a text frame to the connection
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Frame::Text(text.into()))
    }

    /// Make the connection's next read fail with `error`
    pub fn fail(&self, error: TransportError) -> bool {
        self.push(Err(error))
    }

    /// End the connection's read stream, as a peer hanging up would
    pub fn disconnect(&mut self) {
        self.to_server = None;
    }

    /// Next frame written by the connection, or `None` once the connection
    /// has released its end of the transport
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_server.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_server.try_recv().ok()
    }

    fn push(&self, item: Result<Frame, TransportError>) -> bool {
        match &self.to_server {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_moves_frames_both_ways() {
        let (mut transport, mut peer) = memory();

        assert!(peer.send_text("hello"));
        let inbound = transport.stream.next().await.unwrap().unwrap();
        assert_eq!(inbound, Frame::Text("hello".to_string()));

        transport
            .sink
            .send(Frame::Binary(vec![7, 8]))
            .await
            .unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Binary(vec![7, 8])));
    }

    #[tokio::test]
    async fn test_memory_peer_disconnect_ends_stream() {
        let (mut transport, mut peer) = memory();
        peer.disconnect();

        assert!(transport.stream.next().await.is_none());
        assert!(!peer.send_text("too late"));
    }

    #[tokio::test]
    async fn test_memory_peer_injected_fault() {
        let (mut transport, peer) = memory();
        assert!(peer.fail(TransportError::Disconnected));

        let item = transport.stream.next().await.unwrap();
        assert!(matches!(item, Err(TransportError::Disconnected)));
    }

    #[tokio::test]
    async fn test_dropping_sink_releases_peer() {
        let (transport, mut peer) = memory();
        drop(transport);

        assert!(peer.recv().await.is_none());
    }
}
