//! Application State
//!
//! Shared state accessible by all HTTP handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::websocket::Registry;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Registry of live WebSocket connections
    pub registry: Registry,
    /// HTTP server configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Registry, config: ApiConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.registry.connection_count().await
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the HTML pages and the `js/` and `img/` folders
    pub web_root: PathBuf,
    /// Largest inbound WebSocket message in bytes (0 = library default)
    pub max_message_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            web_root: PathBuf::from("./web"),
            max_message_size: 64 * 1024,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
