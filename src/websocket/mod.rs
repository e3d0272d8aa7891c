//! WebSocket Fan-out Hub
//!
//! Generic real-time hub: every accepted connection becomes an actor with its
//! own reader and writer task, all actors live in one registry, and every
//! inbound frame is dispatched to an application [`Handler`] that can reply to
//! the sender or fan out to everyone.
//!
//! ## Architecture
//!
//! - **Connection**: per-connection actor owning the transport
//! - **Registry**: tracks live connections, assigns ids, shuts everything down
//! - **Peers / Sender**: what a handler may do with other connections
//! - **Dispatch**: the [`Handler`] trait and the [`Request`] it receives
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use orderhub::websocket::{transport, Handler, HubConfig, Registry, Request, Sender};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Handler for Echo {
//!     async fn handle(&self, reply_to: &Sender, request: Request) {
//!         let _ = reply_to.send(request.frame);
//!     }
//! }
//!
//! # async fn run() {
//! let registry = Registry::new(Arc::new(Echo), HubConfig::default());
//! let (transport, mut peer) = transport::memory();
//! registry.accept(transport).await.unwrap();
//!
//! peer.send_text("hello");
//! assert!(peer.recv().await.is_some());
//! # }
//! ```

mod connection;
mod dispatch;
mod error;
mod frame;
mod peers;
mod registry;
pub mod transport;
mod upgrade;

pub use connection::{
    CloseCallback, Connection, ConnectionHooks, ConnectionSettings, FrameCallback,
};
pub use dispatch::{dispatch, Handler, Request};
pub use error::{HubError, SendError};
pub use frame::{Frame, FrameKind};
pub use peers::{BroadcastReport, Peers, Sender, Snapshot};
pub use registry::{ConnectionId, HubConfig, Registry};
pub use transport::{MemoryPeer, Transport, TransportError};
pub use upgrade::websocket_handler;
