//! # Orderhub
//!
//! Real-time order board: a WebSocket fan-out hub that keeps a shared list of
//! supply orders in sync across every connected browser.
//!
//! ## Features
//!
//! - **Actor per connection**: independent reader and writer tasks, bounded
//!   outbound queue, per-message cancellation
//! - **Connection registry**: random ids, connection limit, broadcast snapshots,
//!   graceful shutdown that waits for every task
//! - **Pluggable handlers**: anything implementing [`websocket::Handler`]
//! - **Order board**: the handler served at `/order/conn`
//!
//! ## Modules
//!
//! - [`websocket`]: the hub (transport, connection actor, registry, dispatch)
//! - [`orders`]: order board state and its handler
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration

pub mod api;
pub mod config;
pub mod orders;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig, WebSocketConfig};

pub use orders::{Order, OrderBook, OrderHandler};

pub use websocket::{
    ConnectionId, Frame, Handler, HubConfig, HubError, Peers, Registry, Request, SendError,
    Sender, websocket_handler,
};
