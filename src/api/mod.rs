//! Order Board HTTP Server
//!
//! HTTP layer built with Axum.
//!
//! # Endpoints
//!
//! ## Pages
//! - `GET /` - Order table
//! - `GET /create` - Order creation form
//! - `GET /js/*`, `GET /img/*` - Static assets under the web root
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Status and live connection count
//!
//! ## WebSocket
//! - `GET /order/conn` - Order board connection
//!
//! # Example
//!
//! ```rust,no_run
//! use orderhub::api::{serve, ApiConfig, AppState};
//! use orderhub::orders::OrderHandler;
//! use orderhub::websocket::{HubConfig, Registry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(Arc::new(OrderHandler::new()), HubConfig::default());
//!     let state = AppState::new(registry, ApiConfig::default());
//!     serve(state).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::{ApiConfig, AppState};

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::websocket::websocket_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let web_root = state.config.web_root.clone();

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .route("/order/conn", get(websocket_handler))
        .route_service("/", ServeFile::new(web_root.join("order_table.html")))
        .route_service("/create", ServeFile::new(web_root.join("order_creation.html")))
        .nest_service("/js", ServeDir::new(web_root.join("js")))
        .nest_service("/img", ServeDir::new(web_root.join("img")))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Bind the configured address and serve until SIGINT/SIGTERM
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.addr();
    let listener = TcpListener::bind(&addr).await?;

    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `signal` completes
///
/// Every WebSocket connection is closed and its tasks awaited before the
/// HTTP server finishes shutting down.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, signal: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let router = build_router(state);

    let addr = listener.local_addr()?;
    tracing::info!("Order board listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            registry.shutdown().await;
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Order board shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
