//! Transport Actor
//!
//! A [`Connection`] owns exactly one [`Transport`]. Once started it runs two
//! tasks: a reader that pulls frames off the stream and hands them to the
//! inbound callback one at a time, and a writer that drains the outbound queue
//! into the sink. Nothing else touches the transport.
//!
//! ## Close sequence
//!
//! [`Connection::close`] may be triggered concurrently by a read fault, a write
//! fault, a peer hang-up or an external shutdown. Only the first call does
//! anything:
//!
//! 1. further sends are refused with [`SendError::Closed`]
//! 2. the reader and writer are told to stop; a write already in progress is
//!    abandoned, otherwise the writer closes the sink
//! 3. the cancellation token of the frame currently being handled, if any, is
//!    cancelled
//! 4. once both tasks have stopped, the close callback runs exactly once

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::error::SendError;
use super::frame::Frame;
use super::registry::ConnectionId;
use super::transport::{FrameSink, FrameStream, Transport, TransportError};

/// Upper bound on closing the sink once the writer stops
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Invoked for every inbound frame with that frame's cancellation token.
/// The reader waits for the returned future before reading the next frame.
pub type FrameCallback =
    Arc<dyn Fn(CancellationToken, Frame) -> BoxFuture<'static, ()> + Send + Sync>;

/// Invoked once, after the connection has fully stopped
pub type CloseCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Callbacks wired into a connection when it is started
pub struct ConnectionHooks {
    pub on_frame: FrameCallback,
    pub on_close: CloseCallback,
}

/// Per-connection tuning
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Frames that may wait in the outbound queue before sends are refused
    pub outbound_capacity: usize,
    /// Upper bound on a single transport write
    pub write_timeout: Option<Duration>,
    /// Close the connection if the peer is silent for this long
    pub read_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            write_timeout: Some(Duration::from_secs(10)),
            read_timeout: None,
        }
    }
}

/// Transport and queue receiver, held until the connection is started
struct Pending {
    transport: Transport,
    outbound_rx: mpsc::Receiver<Frame>,
}

/// The per-connection actor
pub struct Connection {
    outbound: mpsc::Sender<Frame>,
    pending: Mutex<Option<Pending>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    closed: AtomicBool,
    /// Cancellation token of the frame the reader is currently dispatching
    in_flight: Mutex<Option<CancellationToken>>,
    dropped: AtomicU64,
    settings: ConnectionSettings,
}

impl Connection {
    /// Wrap a transport. Nothing is read or written until [`start`](Self::start).
    pub fn new(transport: Transport, settings: ConnectionSettings) -> Self {
        let (outbound, outbound_rx) = mpsc::channel(settings.outbound_capacity.max(1));

        Self {
            outbound,
            pending: Mutex::new(Some(Pending {
                transport,
                outbound_rx,
            })),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            in_flight: Mutex::new(None),
            dropped: AtomicU64::new(0),
            settings,
        }
    }

    /// Spawn the reader and writer on `tracker`
    ///
    /// Starting twice is ignored. Starting a connection that was closed before
    /// it ever ran only fires `on_close`.
    pub fn start(self: &Arc<Self>, tracker: &TaskTracker, id: ConnectionId, hooks: ConnectionHooks) {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!(connection_id = %id, "Connection already started");
            return;
        }

        let span = tracing::info_span!("connection", connection_id = %id);
        let ConnectionHooks { on_frame, on_close } = hooks;

        let pending = self.pending.lock().take();
        let Some(Pending {
            transport,
            outbound_rx,
        }) = pending
        else {
            tracker.spawn(on_close().instrument(span));
            return;
        };
        let Transport { sink, stream } = transport;

        let writer = tracker.spawn(
            Arc::clone(self)
                .write_loop(sink, outbound_rx)
                .instrument(span.clone()),
        );

        let this = Arc::clone(self);
        tracker.spawn(
            async move {
                this.read_loop(stream, &on_frame).await;
                this.close();

                if let Err(e) = writer.await {
                    tracing::error!(error = %e, "Writer task failed");
                }

                on_close().await;
                tracing::debug!("Connection stopped");
            }
            .instrument(span),
        );
    }

    /// Queue a frame for the writer without waiting on the network
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Queue a text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send(Frame::Text(text.into()))
    }

    /// Queue a binary frame
    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SendError> {
        self.send(Frame::Binary(bytes.into()))
    }

    /// Close the connection. Safe to call any number of times from any task.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown.cancel();

        // Never started: nobody else will release the transport.
        drop(self.pending.lock().take());

        if let Some(token) = self.in_flight.lock().as_ref() {
            token.cancel();
        }
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Frames refused because the outbound queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn read_loop(&self, mut stream: FrameStream, on_frame: &FrameCallback) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = next_frame(&mut stream, self.settings.read_timeout) => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("Peer disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read failed, closing connection");
                    break;
                }
            };

            let token = CancellationToken::new();
            *self.in_flight.lock() = Some(token.clone());
            if self.shutdown.is_cancelled() {
                token.cancel();
            }

            on_frame(token, frame).await;

            self.in_flight.lock().take();
        }
    }

    async fn write_loop(self: Arc<Self>, mut sink: FrameSink, mut outbound_rx: mpsc::Receiver<Frame>) {
        let mut interrupted = false;

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let written = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    interrupted = true;
                    break;
                }
                written = self.write_frame(&mut sink, frame) => written,
            };

            if let Err(e) = written {
                tracing::warn!(error = %e, "Write failed, closing connection");
                self.close();
                break;
            }
        }

        outbound_rx.close();

        // A write the peer never drained; closing would block on it too.
        if interrupted {
            tracing::debug!("Write interrupted by close, dropping transport");
            return;
        }

        let limit = self
            .settings
            .write_timeout
            .map_or(CLOSE_TIMEOUT, |limit| limit.min(CLOSE_TIMEOUT));
        let result = tokio::time::timeout(limit, sink.close())
            .await
            .unwrap_or(Err(TransportError::WriteTimeout(limit)));
        if let Err(e) = result {
            tracing::debug!(error = %e, "Transport did not close cleanly");
        }
    }

    async fn write_frame(&self, sink: &mut FrameSink, frame: Frame) -> Result<(), TransportError> {
        match self.settings.write_timeout {
            Some(limit) => tokio::time::timeout(limit, sink.send(frame))
                .await
                .map_err(|_| TransportError::WriteTimeout(limit))?,
            None => sink.send(frame).await,
        }
    }
}

async fn next_frame(
    stream: &mut FrameStream,
    read_timeout: Option<Duration>,
) -> Result<Option<Frame>, TransportError> {
    match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(item) => item.transpose(),
            Err(_) => Err(TransportError::ReadTimeout(limit)),
        },
        None => stream.next().await.transpose(),
    }
}
