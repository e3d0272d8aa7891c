//! WebSocket Upgrade
//!
//! HTTP entry point: upgrades the request and hands the socket to the
//! registry. Nothing is registered if the upgrade fails.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use std::sync::Arc;

use super::transport::Transport;
use crate::api::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let ws = match state.config.max_message_size {
        0 => ws,
        limit => ws.max_message_size(limit).max_frame_size(limit),
    };

    let registry = state.registry.clone();
    ws.on_failed_upgrade(|e: axum::Error| {
        tracing::warn!(error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        if let Err(e) = registry.accept(Transport::from_websocket(socket)).await {
            tracing::warn!(error = %e, "WebSocket connection rejected");
        }
    })
}
